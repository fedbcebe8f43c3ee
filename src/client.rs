//! Serial client for ThinkGear headsets.
//!
//! Owns the byte transport and the reader thread, and exposes two surfaces:
//!
//! * an event stream ([`MindwaveEvent`]) delivered on a tokio channel, and
//! * a [`MindwaveHandle`] for point-in-time status snapshots and shutdown.
//!
//! The reader thread is the only place the decoder, the payload parser, and
//! the aggregator run; the control context never touches parser state.  The
//! two sides share a value-snapshot of the current sample behind a mutex and
//! a shutdown flag checked between reads — no lock is ever held across I/O.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Local;
use log::{info, warn};
use tokio::sync::mpsc;

use crate::aggregator::{HeadsetStatus, SampleAggregator};
use crate::parse::{parse_payload, FrameDecoder};
use crate::protocol::DEFAULT_BAUD_RATE;
use crate::recording::RowWriter;
use crate::types::{DataValue, MindwaveEvent};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Configuration for [`MindwaveClient`].
#[derive(Debug, Clone)]
pub struct MindwaveClientConfig {
    /// Serial port to open (e.g. `/dev/ttyUSB0`, `COM3`).  `None` picks the
    /// first port the OS enumerates.
    pub port_name: Option<String>,
    /// Serial line speed.  TGAM1 modules and MindWave dongles run at
    /// 57600 baud 8N1 out of the box.
    pub baud_rate: u32,
    /// Where to write the row log.  `None` derives
    /// `eeg_data_<timestamp>.csv` in the working directory.
    pub output_path: Option<PathBuf>,
}

impl Default for MindwaveClientConfig {
    fn default() -> Self {
        Self {
            port_name: None,
            baud_rate: DEFAULT_BAUD_RATE,
            output_path: None,
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Connects a byte transport to the decode → aggregate → log pipeline.
///
/// The transport is pluggable: [`MindwaveClient::connect`] opens a serial
/// port, while [`MindwaveClient::stream_from_reader`] accepts any
/// `Read + Send` byte source (a file of captured bytes, the
/// [`crate::simulator::SimulatedHeadset`], a TCP-bridged dongle).  The
/// pipeline treats every source as lossy and resynchronises silently.
pub struct MindwaveClient {
    config: MindwaveClientConfig,
}

impl MindwaveClient {
    pub fn new(config: MindwaveClientConfig) -> Self {
        Self { config }
    }

    /// Names of the serial ports the OS currently enumerates.
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }

    /// Open the configured serial port and start streaming.
    ///
    /// Returns the event receiver and a handle for status reads and
    /// shutdown.  The 100 ms read timeout keeps the reader thread responsive
    /// to shutdown even when the headset goes quiet.
    pub fn connect(&self) -> Result<(mpsc::UnboundedReceiver<MindwaveEvent>, MindwaveHandle)> {
        let port_name = match &self.config.port_name {
            Some(name) => name.clone(),
            None => Self::list_ports()
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no serial ports found — is the dongle plugged in?"))?,
        };

        info!("opening {port_name} at {} baud", self.config.baud_rate);
        let port = serialport::new(port_name.as_str(), self.config.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| anyhow!("could not open {port_name}: {e}"))?;

        self.start_stream(port, port_name)
    }

    /// Start streaming from an arbitrary byte source.
    ///
    /// `source_name` is only used for the [`MindwaveEvent::Connected`] event
    /// and log lines.
    pub fn stream_from_reader<R: Read + Send + 'static>(
        &self,
        reader: R,
        source_name: &str,
    ) -> Result<(mpsc::UnboundedReceiver<MindwaveEvent>, MindwaveHandle)> {
        self.start_stream(reader, source_name.to_string())
    }

    fn start_stream<R: Read + Send + 'static>(
        &self,
        reader: R,
        source: String,
    ) -> Result<(mpsc::UnboundedReceiver<MindwaveEvent>, MindwaveHandle)> {
        let output_path = self
            .config
            .output_path
            .clone()
            .unwrap_or_else(default_output_path);
        let sink = RowWriter::create(&output_path)
            .map_err(|e| anyhow!("could not create log {}: {e}", output_path.display()))?;
        info!("logging rows to {}", output_path.display());

        let status = Arc::new(Mutex::new(HeadsetStatus::new(Local::now().naive_local())));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(MindwaveEvent::Connected(source.clone()));

        let aggregator = SampleAggregator::new(Arc::clone(&status), Some(sink));
        let reader_shutdown = Arc::clone(&shutdown);
        thread::Builder::new()
            .name("mindwave-reader".into())
            .spawn(move || reader_loop(reader, tx, aggregator, reader_shutdown))
            .map_err(|e| anyhow!("could not spawn reader thread: {e}"))?;

        Ok((
            rx,
            MindwaveHandle {
                status,
                shutdown,
                output_path,
            },
        ))
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "eeg_data_{}.csv",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

// ── Reader loop ───────────────────────────────────────────────────────────────

/// Drives bytes from the transport through decode → parse → aggregate.
///
/// Read timeouts are a normal idle condition, not an error.  Other transport
/// errors are logged and retried after a short pause; decoder state survives,
/// so a transient glitch costs at most the frame in flight.  The loop ends on
/// end-of-stream or shutdown, flushing the sink by dropping it.
fn reader_loop<R: Read>(
    mut reader: R,
    tx: mpsc::UnboundedSender<MindwaveEvent>,
    mut aggregator: SampleAggregator,
    shutdown: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 256];

    while !shutdown.load(Ordering::Relaxed) {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                info!("byte source reached end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("transport read failed: {e}");
                thread::sleep(Duration::from_millis(50));
                continue;
            }
        };

        for &byte in &buf[..n] {
            if let Some(payload) = decoder.push(byte) {
                for value in parse_payload(payload) {
                    if let DataValue::RawWave(raw) = value.value {
                        let _ = tx.send(MindwaveEvent::Raw(raw));
                    }
                    if let Some(sample) = aggregator.handle(&value) {
                        let _ = tx.send(MindwaveEvent::Sample(sample));
                    }
                }
            }
        }
    }

    let _ = tx.send(MindwaveEvent::Disconnected);
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Control-side handle to a running stream.
///
/// Cheap to clone; all methods are safe to call from any thread or task.
#[derive(Clone)]
pub struct MindwaveHandle {
    status: Arc<Mutex<HeadsetStatus>>,
    shutdown: Arc<AtomicBool>,
    output_path: PathBuf,
}

impl MindwaveHandle {
    /// A consistent snapshot of the current sample and its freshness.
    pub fn status(&self) -> HeadsetStatus {
        self.status
            .lock()
            .expect("headset status lock poisoned")
            .clone()
    }

    /// Ask the reader thread to stop.  It finishes the read in flight,
    /// flushes and closes the log, then emits [`MindwaveEvent::Disconnected`].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Where the row log is being written.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}
