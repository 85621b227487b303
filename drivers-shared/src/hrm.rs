//! EM7028 optical heart-rate sensor: register map and one-time setup.
//!
//! Steady-state sampling does not go through this driver; it only names the
//! register to read ([`SAMPLE_REGISTER`]). The driver owns configuration and
//! power-down, which both happen outside the sampling loop.

use embedded_hal_async::{delay::DelayNs, i2c::I2c};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const ADDR: u8 = 0x24;

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Configure = 0x01,
    Hrs1Control = 0x0D,
    IntCtrl = 0x0E,
    SoftReset = 0x0F,
    Hrs1Data0Low = 0x28,
    Hrs1Data0High = 0x29,
}

/// First of the two sample bytes (low, then high).
pub const SAMPLE_REGISTER: Register = Register::Hrs1Data0Low;

const CONFIGURE_OFF: u8 = 0x00;
const CONFIGURE_HRS1_ENABLE: u8 = 0x08;
const HRS1_CONTINUOUS: u8 = 0xC1;
const INT_DISABLED: u8 = 0x00;

/// Applied in order by [`Em7028::configure`].
pub const CONFIG_SEQUENCE: [(Register, u8); 3] = [
    (Register::Configure, CONFIGURE_HRS1_ENABLE),
    (Register::Hrs1Control, HRS1_CONTINUOUS),
    (Register::IntCtrl, INT_DISABLED),
];

/// The sensor needs time to settle after each configuration write.
pub const SETTLE_DELAY_MS: u32 = 500;

/// Whether a `Configure` register value has the HRS1 channel running.
pub fn hrs1_enabled(configure: u8) -> bool {
    configure & CONFIGURE_HRS1_ENABLE != 0
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    I2c(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::I2c(e)
    }
}

pub struct Em7028<I, D> {
    i2c: I,
    delay: D,
}

impl<I: I2c, D: DelayNs> Em7028<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Puts the sensor into continuous HRS1 sampling. Must succeed before
    /// sampling starts; callers treat an error as fatal.
    pub async fn configure(&mut self) -> Result<(), Error<I::Error>> {
        for (reg, val) in CONFIG_SEQUENCE {
            self.write_register(reg, val).await?;
            self.delay.delay_ms(SETTLE_DELAY_MS).await;
        }
        log::info!("EM7028 configured for continuous sampling");
        Ok(())
    }

    pub async fn power_down(&mut self) -> Result<(), Error<I::Error>> {
        self.write_register(Register::Configure, CONFIGURE_OFF).await
    }

    pub async fn read_register(&mut self, reg: Register) -> Result<u8, Error<I::Error>> {
        let mut res = 0;
        self.i2c
            .write_read(ADDR, &[reg.into()], core::slice::from_mut(&mut res))
            .await?;
        Ok(res)
    }

    pub async fn write_register(&mut self, reg: Register, val: u8) -> Result<(), Error<I::Error>> {
        self.i2c.write(ADDR, &[reg.into(), val]).await?;
        Ok(())
    }

    /// Hands the bus back, e.g. to the sampling loop after configuration.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}
