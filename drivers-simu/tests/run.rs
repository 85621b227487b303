use std::time::Duration;

use drivers_simu::hrm::{SimError, Waveform};
use drivers_simu::{run, RunError, SimConfig};
use hrm::BPM;

fn fast_config() -> SimConfig {
    SimConfig {
        speedup: 20,
        ..Default::default()
    }
}

#[test]
fn test_steady_sine_reports_60_bpm() {
    let config = fast_config();
    let mut published = Vec::new();

    let stats = smol::block_on(run(&config, 2400, |bpm| published.push(bpm))).unwrap();

    assert_eq!(stats.ticks, 2400);
    assert!(stats.samples + stats.dropped >= 2300, "{:?}", stats);
    assert_eq!(stats.aborted, 0);
    assert!(stats.beats >= 50, "{:?}", stats);

    let Some(BPM(bpm)) = stats.heart_rate else {
        panic!("no heart rate after {:?}", stats);
    };
    assert!((57..=63).contains(&bpm), "bpm {}", bpm);

    assert_eq!(stats.notifications as usize, published.len());
    for pair in published.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn test_faster_pulse() {
    let config = SimConfig {
        waveform: Waveform {
            period_ticks: 24,
            ..Default::default()
        },
        ..fast_config()
    };

    let stats = smol::block_on(run(&config, 2400, |_| {})).unwrap();

    // 2400 ticks per minute over 24 ticks per beat
    let Some(BPM(bpm)) = stats.heart_rate else {
        panic!("no heart rate after {:?}", stats);
    };
    assert!((95..=105).contains(&bpm), "bpm {}", bpm);
}

#[test]
fn test_bus_faults_do_not_stop_acquisition() {
    let config = SimConfig {
        fail_every: Some(7),
        ..fast_config()
    };

    let stats = smol::block_on(run(&config, 2400, |_| {})).unwrap();

    assert!(stats.aborted > 0);
    assert!(stats.samples > 1200, "{:?}", stats);
    let Some(BPM(bpm)) = stats.heart_rate else {
        panic!("no heart rate after {:?}", stats);
    };
    assert!((50..=70).contains(&bpm), "bpm {}", bpm);
}

#[test]
fn test_slow_bus_drops_ticks() {
    // Each phase takes longer than a tick, so at most every other tick
    // gets through.
    let config = SimConfig {
        bus_latency: Duration::from_millis(30),
        ..fast_config()
    };

    let stats = smol::block_on(run(&config, 400, |_| {})).unwrap();

    assert!(stats.dropped >= 200, "{:?}", stats);
    assert!(stats.samples <= 200, "{:?}", stats);
    assert_eq!(stats.aborted, 0);
}

#[test]
fn test_missing_sensor_fails_configuration() {
    let config = SimConfig {
        sensor_present: false,
        ..fast_config()
    };

    let mut published = Vec::new();
    let res = smol::block_on(run(&config, 100, |bpm| published.push(bpm)));

    assert_eq!(
        res,
        Err(RunError::Configure(drivers_simu::hrm::Error::I2c(
            SimError::Nack
        )))
    );
    assert!(published.is_empty());
}
