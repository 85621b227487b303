use plotpy::{Curve, Plot};
use std::error::Error;

#[derive(serde::Deserialize)]
struct Row {
    val: u16,
}

#[derive(serde::Serialize)]
struct BeatRow {
    ms: u32,
    interval_ticks: u32,
    bpm: Option<u16>,
}

const USAGE: &str = "usage: replay_hrm <samples.csv> [plot.svg]\n       replay_hrm --simulate <ticks> [speedup]";

fn plot_values_multiple(vals: &[&[(f32, f32)]], out: &str) -> Result<(), Box<dyn Error>> {
    let mut plot = Plot::new();
    for (i, vals) in vals.iter().enumerate() {
        let mut curve = Curve::new();
        curve.set_line_width(2.0);

        curve.points_begin();
        for (x, y) in *vals {
            curve.points_add(x, y);
        }
        curve.points_end();
        curve.set_label(&i.to_string());

        plot.add(&curve);
    }

    plot.legend().grid_and_labels("ms", "value").save(out)?;
    Ok(())
}

/// Feeds a recorded sample stream (one `val` column, one row per tick)
/// through the monitor and writes the detected beats as CSV to stdout.
fn replay(path: &str, plot: Option<&str>) -> Result<(), Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut wtr = csv::Writer::from_writer(std::io::stdout());

    let config = hrm::Config::default();
    let mut monitor = hrm::HeartRateMonitor::new(config);

    let mut ms = 0;
    let mut filtered_vals = Vec::new();
    let mut bpm_vals = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Row = record.deserialize(None)?;

        let (filtered, beat) = monitor.add_sample(row.val as i32);
        filtered_vals.push((ms as f32, filtered as f32));

        if let Some(beat) = beat {
            let bpm = beat.bpm.map(|b| b.0);
            wtr.serialize(BeatRow {
                ms,
                interval_ticks: beat.interval_ticks,
                bpm,
            })?;
            if let Some(bpm) = bpm {
                bpm_vals.push((ms as f32, bpm as f32));
            }
        }
        ms += config.tick_period_ms.get();
    }
    wtr.flush()?;

    match monitor.heart_rate() {
        Some(bpm) => eprintln!("Final heart rate: {} bpm", bpm.0),
        None => eprintln!("No beats detected"),
    }

    if let Some(out) = plot {
        plot_values_multiple(&[&filtered_vals, &bpm_vals], out)?;
    }
    Ok(())
}

fn simulate(ticks: u32, speedup: u32) -> Result<(), Box<dyn Error>> {
    let config = drivers_simu::SimConfig {
        speedup,
        ..Default::default()
    };

    let stats = smol::block_on(drivers_simu::run(&config, ticks, |bpm| {
        println!("Heart rate: {} bpm", bpm)
    }))?;

    println!("{:#?}", stats);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let args = args.iter().map(String::as_str).collect::<Vec<_>>();
    match args[..] {
        ["--simulate", ticks] => simulate(ticks.parse()?, 1),
        ["--simulate", ticks, speedup] => simulate(ticks.parse()?, speedup.parse()?),
        [path] => replay(path, None),
        [path, plot] => replay(path, Some(plot)),
        _ => Err(USAGE.into()),
    }
}
