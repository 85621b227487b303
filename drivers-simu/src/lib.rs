//! Host simulation of the heart-rate band: a simulated EM7028 behind an
//! interrupt-style TWI peripheral, driven by a scaled timer tick.

pub mod hrm;
pub mod time;
pub mod twi;

use std::fmt;

use ::hrm::acquisition::{Acquisition, Completion, TickAction};
use ::hrm::{Config, BPM};
use smol::future::FutureExt;

use crate::hrm::{Em7028, SimError, SimSensor, Waveform, SAMPLE_REGISTER};
use crate::time::{Clock, Duration, SimDelay, Ticker};
use crate::twi::{SimBus, SimCompletion};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub hrm: Config,
    /// How much faster than real time the simulation runs.
    pub speedup: u32,
    pub waveform: Waveform,
    /// Time from issuing a bus operation to its completion, in sensor time.
    pub bus_latency: Duration,
    /// Fail every n-th bus operation.
    pub fail_every: Option<u32>,
    pub sensor_present: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hrm: Config::default(),
            speedup: 1,
            waveform: Waveform::default(),
            bus_latency: Duration::from_micros(200),
            fail_every: None,
            sensor_present: true,
        }
    }
}

impl SimConfig {
    pub fn clock(&self) -> Clock {
        Clock::new(self.speedup)
    }

    pub fn tick_period(&self) -> Duration {
        self.clock()
            .scale(Duration::from_millis(self.hrm.tick_period_ms.get() as u64))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u32,
    pub samples: u32,
    /// Ticks skipped because a transfer was still in flight.
    pub dropped: u32,
    pub issue_failures: u32,
    pub aborted: u32,
    pub beats: u32,
    pub notifications: u32,
    pub heart_rate: Option<BPM>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunError {
    Configure(crate::hrm::Error<SimError>),
    PowerDown(crate::hrm::Error<SimError>),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Configure(crate::hrm::Error::I2c(e)) => {
                write!(f, "sensor configuration failed: {}", e)
            }
            RunError::PowerDown(crate::hrm::Error::I2c(e)) => {
                write!(f, "sensor power-down failed: {}", e)
            }
        }
    }
}

impl std::error::Error for RunError {}

enum Event {
    Completion(SimCompletion),
    Tick,
}

/// Configures the simulated sensor, samples it for `ticks` timer ticks and
/// powers it down again. Every heart rate change is handed to `sink`.
pub async fn run(
    config: &SimConfig,
    ticks: u32,
    mut sink: impl FnMut(u8),
) -> Result<RunStats, RunError> {
    let clock = config.clock();

    let sensor = SimSensor::new(config.waveform, config.sensor_present);
    let mut em = Em7028::new(sensor, SimDelay::new(clock));
    em.configure().await.map_err(RunError::Configure)?;
    let (sensor, delay) = em.release();

    let mut bus = SimBus::new(sensor, clock.scale(config.bus_latency));
    if let Some(n) = config.fail_every {
        bus = bus.fail_every(n);
    }
    let mut acq = Acquisition::new(bus, config.hrm, SAMPLE_REGISTER.into());
    acq.sensor_ready();

    let mut stats = RunStats::default();
    let mut ticker = Ticker::every(config.tick_period());

    while stats.ticks < ticks {
        let completion = async { Event::Completion(acq.bus_mut().completion().await) };
        let tick = async {
            ticker.next().await;
            Event::Tick
        };

        let event = completion.or(tick).await;
        match event {
            Event::Completion(c) => {
                let was_read = matches!(c, SimCompletion::Read(_));
                let res = match c {
                    SimCompletion::Written => acq.on_completion(Completion::Written),
                    SimCompletion::Read(bytes) => acq.on_completion(Completion::Read(&bytes)),
                    SimCompletion::Failed(e) => acq.on_completion(Completion::Failed(e)),
                };
                match res {
                    Ok(beat) => {
                        if was_read {
                            stats.samples += 1;
                        }
                        if beat.is_some() {
                            stats.beats += 1;
                        }
                    }
                    Err(e) => {
                        println!("Transfer aborted: {:?}", e);
                        stats.aborted += 1;
                    }
                }
            }
            Event::Tick => {
                acq.bus_mut().sensor_mut().convert();
                let report = acq.on_tick();
                stats.ticks += 1;
                match report.action {
                    TickAction::Dropped => stats.dropped += 1,
                    TickAction::IssueFailed(_) => stats.issue_failures += 1,
                    TickAction::Started | TickAction::NotReady => {}
                }
                if let Some(bpm) = report.notification {
                    stats.notifications += 1;
                    sink(bpm);
                }
            }
        }
    }

    stats.heart_rate = acq.monitor().heart_rate();

    let mut em = Em7028::new(acq.into_bus().into_sensor(), delay);
    em.power_down().await.map_err(RunError::PowerDown)?;

    Ok(stats)
}
