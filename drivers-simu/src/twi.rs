use ::hrm::acquisition::SensorBus;

use crate::hrm::{SimError, SimSensor};
use crate::time::{Duration, Instant, Timer};

/// Owned form of [`hrm::acquisition::Completion`], as it comes out of the
/// simulated peripheral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimCompletion {
    Written,
    Read(Vec<u8>),
    Failed(SimError),
}

/// Interrupt-style TWI master in front of a [`SimSensor`]. An issued
/// operation completes after `latency`; its result is picked up through
/// [`SimBus::completion`].
pub struct SimBus {
    sensor: SimSensor,
    latency: Duration,
    pending: Option<(Instant, SimCompletion)>,
    fail_every: Option<u32>,
    num_ops: u32,
}

impl SimBus {
    pub fn new(sensor: SimSensor, latency: Duration) -> Self {
        Self {
            sensor,
            latency,
            pending: None,
            fail_every: None,
            num_ops: 0,
        }
    }

    /// Every `n`th issued operation completes with [`SimError::Fault`].
    pub fn fail_every(mut self, n: u32) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    pub fn sensor(&self) -> &SimSensor {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut SimSensor {
        &mut self.sensor
    }

    pub fn into_sensor(self) -> SimSensor {
        self.sensor
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the operation in flight. Never resolves while the bus is
    /// idle.
    pub async fn completion(&mut self) -> SimCompletion {
        let Some((due, _)) = &self.pending else {
            return smol::future::pending().await;
        };
        Timer::at(*due).await;
        match self.pending.take() {
            Some((_, c)) => c,
            None => smol::future::pending().await,
        }
    }

    fn issue(&mut self, op: impl FnOnce(&mut SimSensor) -> SimCompletion) -> Result<(), SimError> {
        if self.pending.is_some() {
            return Err(SimError::Busy);
        }
        self.num_ops += 1;
        let completion = match self.fail_every {
            Some(n) if self.num_ops % n == 0 => SimCompletion::Failed(SimError::Fault),
            _ => op(&mut self.sensor),
        };
        self.pending = Some((Instant::now() + self.latency, completion));
        Ok(())
    }
}

impl SensorBus for SimBus {
    type Error = SimError;

    fn begin_write(&mut self, register: u8) -> Result<(), SimError> {
        self.issue(|sensor| match sensor.write(&[register]) {
            Ok(()) => SimCompletion::Written,
            Err(e) => SimCompletion::Failed(e),
        })
    }

    fn begin_read(&mut self, len: usize) -> Result<(), SimError> {
        self.issue(|sensor| {
            let mut buf = vec![0; len];
            match sensor.read(&mut buf) {
                Ok(()) => SimCompletion::Read(buf),
                Err(e) => SimCompletion::Failed(e),
            }
        })
    }
}
