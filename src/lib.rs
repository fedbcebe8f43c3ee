//! # mindwave-rs
//!
//! Rust library and CLI tools for streaming EEG data from NeuroSky
//! ThinkGear-compatible headsets (TGAM1 module, MindWave, MindWave Mobile)
//! over a serial link, logging it to CSV, and exporting recordings as
//! [EDF](https://www.edfplus.info/specs/edf.html) biosignal files.
//!
//! ## What the headset sends
//!
//! | Value | Code | Rate | Shape |
//! |---|---|---|---|
//! | Raw EEG sample | `0x80` | ≈512 Hz | `i16`, big-endian |
//! | Signal quality | `0x02` | ≈1 Hz | `u8`, 0 = perfect |
//! | eSense attention | `0x04` | ≈1 Hz | `u8`, 0–100 |
//! | eSense meditation | `0x05` | ≈1 Hz | `u8`, 0–100 |
//! | Band powers | `0x83` | ≈1 Hz | 8 × 24-bit unsigned, big-endian |
//!
//! Values arrive packed into checksummed frames; the stream is lossy and is
//! joined mid-flight, so the frame decoder resynchronises silently on
//! corruption.
//!
//! ## Quick start
//!
//! ```no_run
//! use mindwave_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MindwaveClient::new(MindwaveClientConfig::default());
//!     let (mut rx, handle) = client.connect()?;
//!
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             MindwaveEvent::Sample(s) => {
//!                 println!("attention {} meditation {}", s.attention, s.meditation)
//!             }
//!             MindwaveEvent::Disconnected => break,
//!             _ => {}
//!         }
//!     }
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! Convert a finished log to EDF:
//!
//! ```no_run
//! use mindwave_rs::edf::{EdfConfig, EdfRecording};
//! use mindwave_rs::recording::read_rows;
//!
//! # fn main() -> anyhow::Result<()> {
//! let rows = read_rows("eeg_data.csv")?;
//! let recording = EdfRecording::prepare(&rows, &EdfConfig::default())?;
//! recording.write_to(std::fs::File::create("eeg_data.edf")?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the commonly needed types |
//! | [`client`] | Serial transport, reader thread, event channel, status snapshots |
//! | [`types`] | Decoded values, the current-sample record, client events |
//! | [`protocol`] | Wire constants, checksum, frame encoding |
//! | [`parse`] | The frame state machine and the tagged payload parser |
//! | [`aggregator`] | Last-observed sample state and the trigger-emit policy |
//! | [`recording`] | The semicolon-delimited CSV log, writer and reader |
//! | [`edf`] | Range analysis, resampling, scaling, and EDF emission |
//! | [`simulator`] | Deterministic frame generator for demos and tests |

pub mod aggregator;
pub mod client;
pub mod edf;
pub mod parse;
pub mod protocol;
pub mod recording;
pub mod simulator;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
///
/// A single glob import covers connecting to a headset, processing its
/// events, and converting a finished log:
///
/// ```no_run
/// use mindwave_rs::prelude::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let client = MindwaveClient::new(MindwaveClientConfig::default());
/// let (mut rx, handle) = client.connect()?;
/// while let Some(event) = rx.blocking_recv() {
///     if let MindwaveEvent::Sample(s) = event {
///         println!("{:?}", s);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    // ── Client ────────────────────────────────────────────────────────────────
    pub use crate::client::{MindwaveClient, MindwaveClientConfig, MindwaveHandle};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::aggregator::HeadsetStatus;
    pub use crate::types::{BandPowers, DataValue, MindwaveEvent, PayloadValue, Sample};

    // ── Offline conversion ────────────────────────────────────────────────────
    pub use crate::edf::{ConvertError, EdfConfig, EdfRecording, EdfSignal};
    pub use crate::recording::{read_rows, RowWriter};

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{BAND_NAMES, DEFAULT_BAUD_RATE, RAW_FREQUENCY};
}
