use util::RingBuffer;

use crate::DETECTION_WINDOW;

/// Zero-crossing detector with a hysteresis band of `±threshold`, where the
/// threshold is the mean absolute value of the last `DETECTION_WINDOW`
/// filtered samples.
///
/// A beat needs a dip below `-threshold` followed by a rise above
/// `+threshold`. Oscillations that stay inside the band never register.
/// Intervals are only reported between two beats: the first beat after
/// construction starts the clock.
#[derive(Clone, PartialEq, Debug)]
pub struct BeatDetector {
    history: RingBuffer<DETECTION_WINDOW, i32>,
    abs_sum: i64,
    below_threshold: bool,
    ticks_since_beat: u32,
    warmup_remaining: u32,
    seen_beat: bool,
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new(0)
    }
}

impl BeatDetector {
    /// The first `warmup` samples only fill the threshold window; no beat
    /// can latch on them.
    pub fn new(warmup: u32) -> Self {
        Self {
            history: Default::default(),
            abs_sum: 0,
            below_threshold: false,
            ticks_since_beat: 0,
            warmup_remaining: warmup,
            seen_beat: false,
        }
    }

    /// Processes one filtered sample, which also counts as one elapsed tick.
    /// Returns the ticks since the previous beat (including this one) if the
    /// sample completes a beat that has a predecessor.
    pub fn push(&mut self, sample: i32) -> Option<u32> {
        let evicted = self.history.add(sample);
        self.abs_sum += sample.unsigned_abs() as i64 - evicted.unsigned_abs() as i64;
        self.ticks_since_beat = self.ticks_since_beat.saturating_add(1);

        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return None;
        }

        let threshold = self.threshold() as i64;
        let sample = sample as i64;

        if sample < -threshold {
            self.below_threshold = true;
            None
        } else if self.below_threshold && sample > threshold {
            self.below_threshold = false;
            let ticks = core::mem::take(&mut self.ticks_since_beat);
            if core::mem::replace(&mut self.seen_beat, true) {
                Some(ticks)
            } else {
                log::debug!("first beat, interval timing starts");
                None
            }
        } else {
            None
        }
    }

    /// Accounts for a tick on which no sample arrived.
    pub fn note_missed_tick(&mut self) {
        self.ticks_since_beat = self.ticks_since_beat.saturating_add(1);
    }

    pub fn threshold(&self) -> i32 {
        (self.abs_sum / DETECTION_WINDOW as i64) as i32
    }

    pub fn is_warming_up(&self) -> bool {
        self.warmup_remaining > 0
    }

    /// Whether a beat has been seen, so the next one yields an interval.
    pub fn has_seen_beat(&self) -> bool {
        self.seen_beat
    }

    pub fn is_below_threshold(&self) -> bool {
        self.below_threshold
    }

    pub fn ticks_since_beat(&self) -> u32 {
        self.ticks_since_beat
    }

    /// Filtered samples in the threshold window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = i32> + '_ {
        self.history.oldest_first().copied()
    }
}
