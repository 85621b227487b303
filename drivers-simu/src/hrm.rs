use std::fmt;

use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

pub use drivers_shared::hrm::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// Nobody answered at the sensor address.
    Nack,
    /// A new transfer was issued while one was still pending.
    Busy,
    /// Injected bus fault.
    Fault,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Nack => write!(f, "sensor did not acknowledge"),
            SimError::Busy => write!(f, "bus busy"),
            SimError::Fault => write!(f, "bus fault"),
        }
    }
}

impl std::error::Error for SimError {}

impl embedded_hal_async::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SimError::Busy => ErrorKind::ArbitrationLoss,
            SimError::Fault => ErrorKind::Bus,
        }
    }
}

/// Photodiode signal produced by the simulated sensor, one value per tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Waveform {
    pub period_ticks: u32,
    pub amplitude: f32,
    pub baseline: f32,
}

impl Default for Waveform {
    fn default() -> Self {
        // 60 bpm at the default 25 ms tick.
        Self {
            period_ticks: 40,
            amplitude: 200.0,
            baseline: 2000.0,
        }
    }
}

impl Waveform {
    pub fn at(&self, tick: u64) -> u16 {
        let period = self.period_ticks.max(1) as u64;
        let phase = (tick % period) as f32 / period as f32;
        let v = (phase * std::f32::consts::TAU).sin() * self.amplitude + self.baseline;
        v.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

const NUM_REGISTERS: usize = 0x40;

/// Register-level model of the EM7028. Register writes auto-increment from
/// the addressed register, reads continue from the last addressed one.
pub struct SimSensor {
    registers: [u8; NUM_REGISTERS],
    pointer: usize,
    waveform: Waveform,
    tick: u64,
    present: bool,
}

impl SimSensor {
    pub fn new(waveform: Waveform, present: bool) -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            pointer: 0,
            waveform,
            tick: 0,
            present,
        }
    }

    /// One conversion period. Latches a new sample into the data registers
    /// while the HRS1 channel is enabled.
    pub fn convert(&mut self) {
        if hrs1_enabled(self.register(Register::Configure)) {
            let [lo, hi] = self.waveform.at(self.tick).to_le_bytes();
            self.registers[Register::Hrs1Data0Low as usize] = lo;
            self.registers[Register::Hrs1Data0High as usize] = hi;
        }
        self.tick += 1;
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.registers[u8::from(reg) as usize]
    }

    pub fn conversions(&self) -> u64 {
        self.tick
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        if !self.present {
            return Err(SimError::Nack);
        }
        let Some((reg, data)) = bytes.split_first() else {
            return Ok(());
        };
        self.pointer = *reg as usize % NUM_REGISTERS;
        for (i, b) in data.iter().enumerate() {
            self.registers[(self.pointer + i) % NUM_REGISTERS] = *b;
        }
        Ok(())
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), SimError> {
        if !self.present {
            return Err(SimError::Nack);
        }
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.registers[(self.pointer + i) % NUM_REGISTERS];
        }
        Ok(())
    }
}

impl ErrorType for SimSensor {
    type Error = SimError;
}

impl I2c for SimSensor {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), SimError> {
        if address != ADDR {
            return Err(SimError::Nack);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => self.write(bytes)?,
                Operation::Read(buf) => self.read(buf)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_period() {
        let w = Waveform::default();
        assert_eq!(w.at(0), 2000);
        assert_eq!(w.at(10), 2200);
        assert_eq!(w.at(30), 1800);
        assert_eq!(w.at(40), w.at(0));
    }

    #[test]
    fn test_no_samples_until_configured() {
        let mut sensor = SimSensor::new(Waveform::default(), true);
        sensor.convert();
        sensor.convert();
        assert_eq!(sensor.register(Register::Hrs1Data0Low), 0);

        smol::block_on(async {
            let mut em = Em7028::new(sensor, crate::time::SimDelay::new(crate::time::Clock::new(1000)));
            em.configure().await.unwrap();
            let (mut sensor, _) = em.release();

            sensor.convert();
            sensor.write(&[u8::from(SAMPLE_REGISTER)]).unwrap();
            let mut buf = [0; 2];
            sensor.read(&mut buf).unwrap();
            assert_eq!(u16::from_le_bytes(buf), Waveform::default().at(2));
        });
    }

    #[test]
    fn test_absent_sensor_nacks() {
        let mut sensor = SimSensor::new(Waveform::default(), false);
        assert_eq!(sensor.write(&[0x01, 0x08]), Err(SimError::Nack));
        let mut em = Em7028::new(sensor, crate::time::SimDelay::new(crate::time::Clock::new(1000)));
        assert_eq!(
            smol::block_on(em.configure()),
            Err(Error::I2c(SimError::Nack))
        );
    }
}
