#![cfg_attr(not(test), no_std)]

//! Heart-rate extraction from a raw optical sensor stream.
//!
//! Raw samples flow through [`SampleFilter`] → [`BeatDetector`] →
//! [`IntervalEstimator`]; [`HeartRateMonitor`] ties the three together and
//! [`acquisition::Acquisition`] drives it from a timer tick and a sensor bus.

pub mod acquisition;
mod detector;
mod estimator;
mod filter;

pub use detector::BeatDetector;
pub use estimator::IntervalEstimator;
pub use filter::{SampleFilter, FILTER_HALF};

use core::num::NonZeroU32;

/// Raw samples in the FIR window.
pub const FILTER_TAPS: usize = 41;
/// Filtered samples used for the adaptive beat threshold.
pub const DETECTION_WINDOW: usize = 100;
/// Beat intervals averaged into one heart rate.
pub const INTERVAL_WINDOW: usize = 30;
/// Bytes per raw sample (low byte, high byte).
pub const SAMPLE_BYTES: usize = 2;
/// Filtered samples produced before the FIR window holds only real input.
/// The beat detector ignores them.
pub const WARMUP_SAMPLES: u32 = FILTER_TAPS as u32 - 1;

pub const DEFAULT_TICK_PERIOD_MS: u32 = 25;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Period of the acquisition timer. One tick is one sample slot.
    pub tick_period_ms: NonZeroU32,
}

const DEFAULT_CONFIG: Config = match Config::from_millis(DEFAULT_TICK_PERIOD_MS) {
    Some(config) => config,
    None => panic!("default tick period is zero"),
};

impl Default for Config {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl Config {
    /// `None` for a zero tick period.
    pub const fn from_millis(tick_period_ms: u32) -> Option<Self> {
        match NonZeroU32::new(tick_period_ms) {
            Some(tick_period_ms) => Some(Self { tick_period_ms }),
            None => None,
        }
    }

    pub const fn ticks_per_minute(&self) -> u32 {
        60_000 / self.tick_period_ms.get()
    }

    /// Divided by the sum of a full interval window this gives beats per
    /// minute (72000 at 25 ms).
    pub const fn bpm_numerator(&self) -> u32 {
        self.ticks_per_minute() * INTERVAL_WINDOW as u32
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BPM(pub u16);

impl BPM {
    /// The single-byte value handed to the transport.
    pub fn as_u8(self) -> u8 {
        self.0.min(u8::MAX as u16) as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Beat {
    /// Ticks since the previous beat.
    pub interval_ticks: u32,
    pub bpm: Option<BPM>,
}

/// Filter, detector and estimator chained in acquisition order.
#[derive(Clone, PartialEq, Debug)]
pub struct HeartRateMonitor {
    filter: SampleFilter,
    detector: BeatDetector,
    estimator: IntervalEstimator,
    published: Option<u8>,
}

impl HeartRateMonitor {
    pub fn new(config: Config) -> Self {
        Self {
            filter: SampleFilter::new(),
            detector: BeatDetector::new(WARMUP_SAMPLES),
            estimator: IntervalEstimator::new(config),
            published: None,
        }
    }

    /// Processes one raw sample. Returns the filtered value and, if this
    /// sample completed a beat with a predecessor, the beat.
    pub fn add_sample(&mut self, s: i32) -> (i32, Option<Beat>) {
        let filtered = self.filter.push(s);
        let beat = self.detector.push(filtered).map(|interval_ticks| {
            let bpm = self.estimator.record_interval(interval_ticks);
            match bpm {
                Some(b) => log::debug!("beat after {} ticks, {} bpm", interval_ticks, b.0),
                None => log::debug!("beat after {} ticks", interval_ticks),
            }
            Beat {
                interval_ticks,
                bpm,
            }
        });
        (filtered, beat)
    }

    /// A tick passed without a sample (bus busy or transfer failed). Only
    /// elapsed time advances; no history changes.
    pub fn note_missed_tick(&mut self) {
        self.detector.note_missed_tick();
    }

    pub fn heart_rate(&self) -> Option<BPM> {
        self.estimator.heart_rate()
    }

    /// The heart rate byte, if it changed since the last call.
    pub fn take_notification(&mut self) -> Option<u8> {
        let current = self.heart_rate()?.as_u8();
        if self.published == Some(current) {
            None
        } else {
            self.published = Some(current);
            Some(current)
        }
    }

    pub fn filter(&self) -> &SampleFilter {
        &self.filter
    }

    pub fn detector(&self) -> &BeatDetector {
        &self.detector
    }

    pub fn estimator(&self) -> &IntervalEstimator {
        &self.estimator
    }
}
