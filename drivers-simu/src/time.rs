pub use std::time::{Duration, Instant};

pub use smol::Timer;

/// Maps sensor time onto wall-clock time. A speedup of 10 runs a 25 ms
/// tick every 2.5 ms.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Clock {
    speedup: u32,
}

impl Clock {
    pub fn new(speedup: u32) -> Self {
        Self {
            speedup: speedup.max(1),
        }
    }

    pub fn scale(&self, d: Duration) -> Duration {
        d / self.speedup
    }
}

pub struct Ticker {
    duration: Duration,
    next: Instant,
}

impl Ticker {
    pub fn every(d: Duration) -> Ticker {
        Self {
            duration: d,
            next: Instant::now() + d,
        }
    }

    pub async fn next(&mut self) {
        Timer::at(self.next).await;
        self.next += self.duration;
    }
}

/// Blocking waits of the sensor driver, on the scaled clock.
pub struct SimDelay {
    clock: Clock,
}

impl SimDelay {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }
}

impl embedded_hal_async::delay::DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        Timer::after(self.clock.scale(Duration::from_nanos(ns as u64))).await;
    }
}
