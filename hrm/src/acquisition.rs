//! Timer-driven sampling over a register bus.
//!
//! Every tick starts at most one two-phase transfer: write the sample register
//! address, then read [`SAMPLE_BYTES`] from it. The bus reports completion of
//! each phase back through [`Acquisition::on_completion`], from the same event
//! loop that delivers ticks. Ticks that arrive while a transfer is still in
//! flight are dropped, not queued.

use crate::{Beat, Config, HeartRateMonitor, SAMPLE_BYTES};

/// Non-blocking access to the sensor's register interface. Each call only
/// issues the operation; its outcome is delivered later as a [`Completion`].
pub trait SensorBus {
    type Error;

    /// Selects `register` as the target of the next read.
    fn begin_write(&mut self, register: u8) -> Result<(), Self::Error>;

    /// Reads `len` bytes starting at the selected register.
    fn begin_read(&mut self, len: usize) -> Result<(), Self::Error>;
}

/// Outcome of the operation last issued on a [`SensorBus`].
#[derive(Debug, PartialEq)]
pub enum Completion<'a, E> {
    Written,
    Read(&'a [u8]),
    Failed(E),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    Idle,
    Writing,
    Reading,
}

impl TransferState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, TransferState::Idle)
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError<E> {
    /// The bus reported a failed write or read.
    Bus(E),
    /// Issuing the read phase failed.
    Issue(E),
    ShortRead { expected: usize, got: usize },
    /// A completion arrived that does not match the transfer in flight.
    Unexpected,
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickAction<E> {
    /// The sensor has not signalled readiness yet.
    NotReady,
    Started,
    /// A transfer was still in flight.
    Dropped,
    /// Issuing the write phase failed; retried on the next tick.
    IssueFailed(E),
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport<E> {
    pub action: TickAction<E>,
    /// New heart rate for the transport, if it changed since the last tick.
    pub notification: Option<u8>,
}

/// Acquisition scheduler and bus transfer controller.
pub struct Acquisition<B> {
    bus: B,
    sample_register: u8,
    state: TransferState,
    ready: bool,
    monitor: HeartRateMonitor,
}

/// Composes a raw sample from (low byte, high byte).
pub fn decode_sample(bytes: &[u8]) -> Option<i32> {
    match bytes {
        [lo, hi] => Some(u16::from_le_bytes([*lo, *hi]) as i32),
        _ => None,
    }
}

impl<B: SensorBus> Acquisition<B> {
    pub fn new(bus: B, config: Config, sample_register: u8) -> Self {
        Self {
            bus,
            sample_register,
            state: TransferState::Idle,
            ready: false,
            monitor: HeartRateMonitor::new(config),
        }
    }

    /// Readiness event from the one-time sensor setup. Ticks before this
    /// leave the bus alone.
    pub fn sensor_ready(&mut self) {
        log::info!("sensor ready, starting acquisition");
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn on_tick(&mut self) -> TickReport<B::Error> {
        let notification = self.monitor.take_notification();

        let action = if !self.ready {
            TickAction::NotReady
        } else if self.state.is_busy() {
            self.monitor.note_missed_tick();
            TickAction::Dropped
        } else {
            match self.bus.begin_write(self.sample_register) {
                Ok(()) => {
                    self.state = TransferState::Writing;
                    TickAction::Started
                }
                Err(e) => {
                    log::warn!("could not start sensor transfer");
                    self.monitor.note_missed_tick();
                    TickAction::IssueFailed(e)
                }
            }
        };

        TickReport {
            action,
            notification,
        }
    }

    /// Handles the bus outcome of the current phase. A finished write starts
    /// the read; a finished read feeds the sample through the monitor and
    /// then frees the bus. Any error ends the cycle and leaves the bus idle.
    pub fn on_completion(
        &mut self,
        completion: Completion<'_, B::Error>,
    ) -> Result<Option<Beat>, TransferError<B::Error>> {
        match (self.state, completion) {
            (TransferState::Idle, _) => {
                log::warn!("completion without a transfer in flight");
                Err(TransferError::Unexpected)
            }
            (_, Completion::Failed(e)) => Err(self.abort(TransferError::Bus(e))),
            (TransferState::Writing, Completion::Written) => {
                match self.bus.begin_read(SAMPLE_BYTES) {
                    Ok(()) => {
                        self.state = TransferState::Reading;
                        Ok(None)
                    }
                    Err(e) => Err(self.abort(TransferError::Issue(e))),
                }
            }
            (TransferState::Reading, Completion::Read(bytes)) => {
                let Some(sample) = decode_sample(bytes) else {
                    return Err(self.abort(TransferError::ShortRead {
                        expected: SAMPLE_BYTES,
                        got: bytes.len(),
                    }));
                };
                let (_, beat) = self.monitor.add_sample(sample);
                self.state = TransferState::Idle;
                Ok(beat)
            }
            _ => Err(self.abort(TransferError::Unexpected)),
        }
    }

    fn abort(&mut self, error: TransferError<B::Error>) -> TransferError<B::Error> {
        log::warn!("sensor transfer aborted");
        self.state = TransferState::Idle;
        self.monitor.note_missed_tick();
        error
    }

    pub fn transfer_state(&self) -> TransferState {
        self.state
    }

    pub fn monitor(&self) -> &HeartRateMonitor {
        &self.monitor
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Gives up the bus, e.g. to power the sensor down.
    pub fn into_bus(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BPM;

    const SAMPLE_REG: u8 = 0x28;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Call {
        Write(u8),
        Read(usize),
    }

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    struct Nack;

    #[derive(Default)]
    struct MockBus {
        calls: Vec<Call>,
        refuse_write: bool,
        refuse_read: bool,
    }

    impl SensorBus for MockBus {
        type Error = Nack;

        fn begin_write(&mut self, register: u8) -> Result<(), Nack> {
            if self.refuse_write {
                return Err(Nack);
            }
            self.calls.push(Call::Write(register));
            Ok(())
        }

        fn begin_read(&mut self, len: usize) -> Result<(), Nack> {
            if self.refuse_read {
                return Err(Nack);
            }
            self.calls.push(Call::Read(len));
            Ok(())
        }
    }

    fn ready_acquisition() -> Acquisition<MockBus> {
        let mut acq = Acquisition::new(MockBus::default(), Config::default(), SAMPLE_REG);
        acq.sensor_ready();
        acq
    }

    /// One tick with both phases completing before the next tick. Returns
    /// the tick's notification.
    #[track_caller]
    fn full_cycle(acq: &mut Acquisition<MockBus>, sample: u16) -> Option<u8> {
        let report = acq.on_tick();
        assert_eq!(report.action, TickAction::Started);
        assert_eq!(acq.on_completion(Completion::Written), Ok(None));
        acq.on_completion(Completion::Read(&sample.to_le_bytes()))
            .unwrap();
        assert_eq!(acq.transfer_state(), TransferState::Idle);
        report.notification
    }

    #[test]
    fn test_decode_sample() {
        assert_eq!(decode_sample(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(decode_sample(&[0xff, 0xff]), Some(65535));
        assert_eq!(decode_sample(&[0x01]), None);
        assert_eq!(decode_sample(&[1, 2, 3]), None);
    }

    #[test]
    fn test_ticks_before_ready_do_not_touch_bus() {
        let mut acq = Acquisition::new(MockBus::default(), Config::default(), SAMPLE_REG);
        for _ in 0..5 {
            assert_eq!(acq.on_tick().action, TickAction::NotReady);
        }
        assert!(acq.bus().calls.is_empty());
        assert!(!acq.is_ready());

        acq.sensor_ready();
        assert_eq!(acq.on_tick().action, TickAction::Started);
        assert_eq!(acq.bus().calls, vec![Call::Write(SAMPLE_REG)]);
    }

    #[test]
    fn test_write_then_read() {
        let mut acq = ready_acquisition();

        acq.on_tick();
        assert_eq!(acq.transfer_state(), TransferState::Writing);
        assert_eq!(acq.bus().calls, vec![Call::Write(SAMPLE_REG)]);

        acq.on_completion(Completion::Written).unwrap();
        assert_eq!(acq.transfer_state(), TransferState::Reading);
        assert_eq!(
            acq.bus().calls,
            vec![Call::Write(SAMPLE_REG), Call::Read(SAMPLE_BYTES)]
        );

        acq.on_completion(Completion::Read(&[0xe8, 0x03])).unwrap();
        assert_eq!(acq.transfer_state(), TransferState::Idle);
        assert_eq!(acq.monitor().filter().history().last(), Some(1000));
    }

    #[test]
    fn test_single_flight() {
        let mut acq = ready_acquisition();

        assert_eq!(acq.on_tick().action, TickAction::Started);
        assert!(acq.transfer_state().is_busy());
        assert_eq!(acq.on_tick().action, TickAction::Dropped);
        assert!(acq.transfer_state().is_busy());

        acq.on_completion(Completion::Written).unwrap();
        assert!(acq.transfer_state().is_busy());
        assert_eq!(acq.on_tick().action, TickAction::Dropped);
        assert_eq!(acq.on_tick().action, TickAction::Dropped);

        acq.on_completion(Completion::Read(&[0, 0])).unwrap();
        assert!(!acq.transfer_state().is_busy());

        // One write and one read despite four ticks
        assert_eq!(
            acq.bus().calls,
            vec![Call::Write(SAMPLE_REG), Call::Read(SAMPLE_BYTES)]
        );
        // The sample plus three dropped ticks
        assert_eq!(acq.monitor().detector().ticks_since_beat(), 4);
    }

    #[test]
    fn test_bus_error_leaves_histories_untouched() {
        let mut acq = ready_acquisition();
        for i in 0..60u16 {
            full_cycle(&mut acq, 1000 + (i % 5) * 40);
        }
        let before = acq.monitor().clone();

        // Fails during the write phase
        acq.on_tick();
        assert_eq!(
            acq.on_completion(Completion::Failed(Nack)),
            Err(TransferError::Bus(Nack))
        );
        assert_eq!(acq.transfer_state(), TransferState::Idle);

        // Fails during the read phase
        acq.on_tick();
        acq.on_completion(Completion::Written).unwrap();
        assert_eq!(
            acq.on_completion(Completion::Failed(Nack)),
            Err(TransferError::Bus(Nack))
        );
        assert_eq!(acq.transfer_state(), TransferState::Idle);

        let after = acq.monitor();
        assert_eq!(after.filter(), before.filter());
        assert_eq!(after.estimator(), before.estimator());
        assert!(after.detector().history().eq(before.detector().history()));
        assert_eq!(
            after.detector().is_below_threshold(),
            before.detector().is_below_threshold()
        );
        assert_eq!(
            after.detector().ticks_since_beat(),
            before.detector().ticks_since_beat() + 2
        );

        // Next tick retries normally
        full_cycle(&mut acq, 1000);
    }

    #[test]
    fn test_issue_failures_abort_cycle() {
        let mut acq = ready_acquisition();

        acq.bus_mut().refuse_write = true;
        assert_eq!(acq.on_tick().action, TickAction::IssueFailed(Nack));
        assert_eq!(acq.transfer_state(), TransferState::Idle);

        acq.bus_mut().refuse_write = false;
        acq.bus_mut().refuse_read = true;
        acq.on_tick();
        assert_eq!(
            acq.on_completion(Completion::Written),
            Err(TransferError::Issue(Nack))
        );
        assert_eq!(acq.transfer_state(), TransferState::Idle);
    }

    #[test]
    fn test_short_read_and_stray_completions() {
        let mut acq = ready_acquisition();

        assert_eq!(
            acq.on_completion(Completion::Read(&[1, 2])),
            Err(TransferError::Unexpected)
        );

        acq.on_tick();
        assert_eq!(
            acq.on_completion(Completion::Read(&[1, 2])),
            Err(TransferError::Unexpected)
        );
        assert_eq!(acq.transfer_state(), TransferState::Idle);

        acq.on_tick();
        acq.on_completion(Completion::Written).unwrap();
        assert_eq!(
            acq.on_completion(Completion::Read(&[1])),
            Err(TransferError::ShortRead {
                expected: SAMPLE_BYTES,
                got: 1
            })
        );
        assert_eq!(acq.transfer_state(), TransferState::Idle);
        assert!(acq.monitor().filter().history().all(|s| s == 0));
    }

    #[test]
    fn test_square_wave_publishes_60_bpm() {
        let mut acq = ready_acquisition();
        let mut notifications = Vec::new();

        for tick in 0..2400 {
            let sample = if tick % 40 < 20 { 1500 } else { 500 };
            if let Some(n) = full_cycle(&mut acq, sample) {
                notifications.push(n);
            }
        }

        assert_eq!(acq.monitor().heart_rate(), Some(BPM(60)));
        assert_eq!(notifications.last(), Some(&60));
    }
}
