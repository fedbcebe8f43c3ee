//! Offline converter: turn a recorded CSV log into an EDF file.
//!
//! Usage:
//!   csv2edf eeg_data.csv                       # writes eeg_data.edf
//!   csv2edf eeg_data.csv session.edf           # explicit output
//!   csv2edf eeg_data.csv --record-duration 0.5 # shorter data records
//!   csv2edf eeg_data.csv --raw-rate 256        # declare a different raw rate

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;

use mindwave_rs::edf::{EdfConfig, EdfRecording};
use mindwave_rs::recording::read_rows;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: EdfConfig,
}

fn parse_args() -> Result<Args> {
    let mut input = None;
    let mut output = None;
    let mut config = EdfConfig::default();

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--record-duration" => {
                let Some(value) = iter.next() else {
                    bail!("--record-duration requires a value in seconds");
                };
                config.data_record_duration = value
                    .parse()
                    .with_context(|| format!("bad record duration: {value}"))?;
                if config.data_record_duration <= 0.0 {
                    bail!("record duration must be positive");
                }
            }
            "--raw-rate" => {
                let Some(value) = iter.next() else {
                    bail!("--raw-rate requires a rate in Hz");
                };
                config.raw_rate = value
                    .parse()
                    .with_context(|| format!("bad raw rate: {value}"))?;
                if config.raw_rate == 0 {
                    bail!("raw rate must be positive");
                }
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            path if output.is_none() => output = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument: {extra}"),
        }
    }

    let Some(input) = input else {
        bail!("usage: csv2edf <log.csv> [out.edf] [--record-duration SECS]");
    };
    let output = output.unwrap_or_else(|| input.with_extension("edf"));
    Ok(Args {
        input,
        output,
        config,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;

    let rows = read_rows(&args.input)
        .with_context(|| format!("could not read {}", args.input.display()))?;
    info!("loaded {} rows from {}", rows.len(), args.input.display());

    // Prepare fully before touching the output path: a log that cannot be
    // converted must not leave a partial EDF behind.
    let recording = EdfRecording::prepare(&rows, &args.config)
        .with_context(|| format!("cannot convert {}", args.input.display()))?;

    let file = File::create(&args.output)
        .with_context(|| format!("could not create {}", args.output.display()))?;
    recording
        .write_to(file)
        .with_context(|| format!("writing {} failed", args.output.display()))?;

    info!(
        "wrote {}: {} signals, {} data records",
        args.output.display(),
        recording.signals().len(),
        recording.n_records(),
    );
    Ok(())
}
