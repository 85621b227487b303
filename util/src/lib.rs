#![cfg_attr(not(test), no_std)]

/// Fixed-capacity history. All `N` slots exist from the start (filled with
/// `T::default()`); `add` overwrites the oldest slot and moves the head.
#[derive(Clone, PartialEq, Debug)]
pub struct RingBuffer<const N: usize, T> {
    ring_buffer: [T; N],
    next: usize,
    num_total: usize,
}

impl<const N: usize, T: Default> Default for RingBuffer<N, T> {
    fn default() -> Self {
        Self {
            ring_buffer: core::array::from_fn(|_| Default::default()),
            next: 0,
            num_total: 0,
        }
    }
}

impl<const N: usize, T> RingBuffer<N, T> {
    /// Stores `v` as the newest value and returns the value it displaced.
    pub fn add(&mut self, mut v: T) -> T {
        self.num_total = self.num_total.saturating_add(1);

        core::mem::swap(&mut self.ring_buffer[self.next], &mut v);
        self.next = (self.next + 1) % N;

        v
    }

    /// `past_value(1)` is the newest value, `past_value(N)` the oldest slot.
    pub fn past_value(&self, diff: usize) -> &T {
        assert!(0 < diff && diff <= N, "diff out of range");
        let i = (self.next + N - diff) % N;
        &self.ring_buffer[i]
    }

    /// Slot `i` of the window in time order: 0 is the oldest slot, `N - 1` the newest.
    pub fn chronological(&self, i: usize) -> &T {
        &self.ring_buffer[(self.next + i) % N]
    }

    /// All slots from oldest to newest, including slots never written.
    pub fn oldest_first(&self) -> impl Iterator<Item = &T> + Clone + '_ {
        (0..N).map(|i| self.chronological(i))
    }

    pub fn num_valid(&self) -> usize {
        self.num_total.min(N)
    }

    /// The written values, newest first.
    pub fn valid_values(&self) -> impl Iterator<Item = &T> + '_ {
        (1..=self.num_valid()).map(|diff| self.past_value(diff))
    }

    pub fn is_full(&self) -> bool {
        self.num_valid() == N
    }
}
