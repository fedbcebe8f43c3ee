//! Live recorder: stream a ThinkGear headset to a CSV log.
//!
//! Usage:
//!   mindwave                       # first serial port the OS lists
//!   mindwave /dev/ttyUSB0          # explicit port
//!   mindwave --simulate            # no hardware, built-in signal generator
//!   mindwave --output session.csv  # explicit log path

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{bail, Result};
use log::{error, info};

use mindwave_rs::client::{MindwaveClient, MindwaveClientConfig};
use mindwave_rs::simulator::SimulatedHeadset;
use mindwave_rs::types::MindwaveEvent;

struct Args {
    simulate: bool,
    port_name: Option<String>,
    output_path: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        simulate: false,
        port_name: None,
        output_path: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--simulate" => args.simulate = true,
            "--output" => {
                let Some(path) = iter.next() else {
                    bail!("--output requires a path");
                };
                args.output_path = Some(PathBuf::from(path));
            }
            "--list-ports" => {
                for port in MindwaveClient::list_ports() {
                    println!("{port}");
                }
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            port => args.port_name = Some(port.to_string()),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=mindwave_rs=debug cargo run
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = MindwaveClientConfig {
        port_name: args.port_name,
        output_path: args.output_path,
        ..MindwaveClientConfig::default()
    };
    let client = MindwaveClient::new(config);

    // ── Connect ───────────────────────────────────────────────────────────────
    let (mut rx, handle) = if args.simulate {
        info!("using the simulated headset — no hardware required");
        client.stream_from_reader(SimulatedHeadset::new(true), "<simulator>")?
    } else {
        client.connect()?
    };

    info!("Streaming started. Press Ctrl-C or type 'q' + Enter to quit.");
    info!("Commands (type + Enter):");
    info!("  q  – quit");
    info!("  s  – print a status snapshot");

    // ── Stdin command loop ────────────────────────────────────────────────────
    // Lines are read on a dedicated OS thread (a blocking StdinLock must not
    // be held across await points), then relayed to the async side.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.send(l.trim().to_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let command_handle = handle.clone();
    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            match line.as_str() {
                "" => {}
                "q" => {
                    info!("Quit requested.");
                    command_handle.shutdown();
                }
                "s" => {
                    let status = command_handle.status();
                    let s = &status.sample;
                    println!(
                        "[STATUS] attention={:3}  meditation={:3}  quality={:3}  \
                         raw={:+6}  last update {}",
                        s.attention,
                        s.meditation,
                        s.signal_quality,
                        s.raw_wave,
                        status.last_update.format("%H:%M:%S%.3f"),
                    );
                }
                other => error!("unknown command: '{other}'"),
            }
        }
    });

    // ── Main event loop ───────────────────────────────────────────────────────
    let mut raw_count: u64 = 0;
    while let Some(event) = rx.recv().await {
        match event {
            MindwaveEvent::Connected(source) => {
                info!("Connected to: {source}");
            }
            MindwaveEvent::Disconnected => {
                info!("Stream ended.");
                break;
            }
            MindwaveEvent::Sample(s) => {
                println!(
                    "[ROW] {}  attention={:3}  meditation={:3}  quality={:3}  delta={}",
                    s.timestamp.format("%H:%M:%S%.3f"),
                    s.attention,
                    s.meditation,
                    s.signal_quality,
                    s.bands.delta,
                );
            }
            MindwaveEvent::Raw(_) => {
                // ~512 per second; count them instead of printing.
                raw_count += 1;
            }
        }
    }

    info!(
        "Recording finished – {raw_count} raw samples seen, log at {}",
        handle.output_path().display()
    );
    Ok(())
}
