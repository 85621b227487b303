use util::RingBuffer;

use crate::{Config, BPM, INTERVAL_WINDOW};

/// Averages the last `INTERVAL_WINDOW` beat intervals into a heart rate.
#[derive(Clone, PartialEq, Debug)]
pub struct IntervalEstimator {
    intervals: RingBuffer<INTERVAL_WINDOW, u32>,
    config: Config,
    current: Option<BPM>,
}

impl IntervalEstimator {
    pub fn new(config: Config) -> Self {
        Self {
            intervals: Default::default(),
            config,
            current: None,
        }
    }

    /// Records the ticks between two beats and returns the updated estimate.
    ///
    /// Until the window has filled, the estimate averages over the intervals
    /// recorded so far. A zero interval is not a beat and leaves the window
    /// untouched.
    pub fn record_interval(&mut self, ticks: u32) -> Option<BPM> {
        if ticks == 0 {
            log::warn!("ignoring zero-length beat interval");
            return self.current;
        }

        self.intervals.add(ticks);

        let count = self.intervals.num_valid() as u64;
        let total_ticks: u64 = self.intervals.valid_values().map(|t| *t as u64).sum();

        // K / sum for a full window, scaled down to `count` intervals before.
        let bpm = (self.config.bpm_numerator() as u64 * count)
            / (INTERVAL_WINDOW as u64 * total_ticks);
        self.current = Some(BPM(bpm.min(u16::MAX as u64) as u16));
        self.current
    }

    /// `None` until the first interval has been recorded.
    pub fn heart_rate(&self) -> Option<BPM> {
        self.current
    }

    /// The interval window, oldest first. Slots not yet written read as zero.
    pub fn intervals(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.oldest_first().copied()
    }
}
