//! Offline conversion of a sample log into a European Data Format file.
//!
//! EDF (1985) is the lingua franca of biosignal tooling: a 256-byte ASCII
//! main header, one 256-byte ASCII header block per signal, then interleaved
//! little-endian 16-bit data records.  Each record covers a fixed wall-clock
//! span and carries `samples_per_record` values for every signal.
//!
//! The conversion pipeline is single-threaded and transactional at the file
//! level — either a complete EDF is produced or none:
//!
//! 1. [`ChannelRanges::analyse`] — min/max per data-driven channel
//! 2. [`EdfRecording::prepare`] — build signal descriptors, resample the
//!    asynchronous row timeline onto the fixed EDF grid, scale to digital
//! 3. [`EdfRecording::write_to`] — emit header and records
//!
//! # Resampling fidelity
//!
//! The raw channel is reconstructed by nearest-neighbour mapping over the
//! *index* space: the logged rows are stretched across the declared 512 Hz
//! grid.  This preserves the total span but is not time-accurate — the log
//! only keeps the last raw value per row, so true 512 Hz reconstruction is
//! impossible from this source.  Time-accurate interpolation of the 1 Hz
//! channels, by contrast, uses real timestamps (±0.5 s windows around each
//! whole second).

use std::io::{self, BufWriter, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

use crate::protocol::{BAND_NAMES, BAND_RANGES, METRIC_FREQUENCY, RAW_FREQUENCY};
use crate::types::Sample;

/// Byte length of the EDF main header.
const MAIN_HEADER_LEN: usize = 256;
/// Byte length of the per-signal header block.
const SIGNAL_HEADER_LEN: usize = 256;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("the log contains no usable rows")]
    NoData,

    #[error("rows span no measurable time, nothing to resample")]
    EmptyTimeSpan,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Conversion parameters.
#[derive(Debug, Clone)]
pub struct EdfConfig {
    /// Wall-clock seconds covered by one data record.
    pub data_record_duration: f64,
    /// Sample rate declared for the raw EEG channel.
    pub raw_rate: u32,
}

impl Default for EdfConfig {
    fn default() -> Self {
        Self {
            data_record_duration: 1.0,
            raw_rate: RAW_FREQUENCY,
        }
    }
}

// ── Signal descriptor ─────────────────────────────────────────────────────────

/// One EDF signal: header fields plus its digital sample array.
///
/// Constructed by [`build_signals`], populated during resampling, then frozen
/// for emission.
#[derive(Debug, Clone)]
pub struct EdfSignal {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub data: Vec<i16>,
}

impl EdfSignal {
    /// Linear physical→digital conversion with clamping to the digital range.
    ///
    /// A degenerate physical range (max ≤ min) maps everything to
    /// `digital_min`; this happens for a channel that never moved, e.g. a raw
    /// channel that logged a constant zero.
    pub fn to_digital(&self, value: f64) -> i16 {
        if self.physical_max <= self.physical_min {
            return self.digital_min as i16;
        }
        let span_phys = self.physical_max - self.physical_min;
        let span_dig = (self.digital_max - self.digital_min) as f64;
        let scaled = (value - self.physical_min) / span_phys * span_dig + self.digital_min as f64;
        (scaled.round() as i64).clamp(self.digital_min as i64, self.digital_max as i64) as i16
    }

    /// Inverse of [`EdfSignal::to_digital`], as an EDF reader would apply it.
    pub fn to_physical(&self, digital: i16) -> f64 {
        let span_phys = self.physical_max - self.physical_min;
        let span_dig = (self.digital_max - self.digital_min) as f64;
        self.physical_min + (digital as i32 - self.digital_min) as f64 * span_phys / span_dig
    }
}

// ── Range analysis ────────────────────────────────────────────────────────────

/// Observed min/max of one channel, or `None` if nothing contributed.
#[derive(Debug, Clone, Copy, Default)]
struct Range(Option<(f64, f64)>);

impl Range {
    fn update(&mut self, value: f64) {
        self.0 = Some(match self.0 {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
    }

    fn or_default(self, lo: f64, hi: f64) -> (f64, f64) {
        self.0.unwrap_or((lo, hi))
    }
}

/// Per-channel extrema of the data-driven channels.
///
/// Only the raw wave and the band powers take their physical range from the
/// data; the eSense and signal-quality channels have fixed, protocol-defined
/// ranges.  Pure and deterministic.
#[derive(Debug, Clone)]
pub struct ChannelRanges {
    /// (min, max) of the raw channel; [−500, +500] when no rows exist.
    pub raw: (f64, f64),
    /// (min, max) per band in wire order; [0, 1000] for silent bands.
    pub bands: [(f64, f64); 8],
}

impl ChannelRanges {
    pub fn analyse(rows: &[Sample]) -> Self {
        let mut raw = Range::default();
        let mut bands = [Range::default(); 8];
        for row in rows {
            raw.update(row.raw_wave as f64);
            for (range, power) in bands.iter_mut().zip(row.bands.as_array()) {
                range.update(power as f64);
            }
        }
        Self {
            raw: raw.or_default(-500.0, 500.0),
            bands: bands.map(|r| r.or_default(0.0, 1000.0)),
        }
    }
}

// ── Signal builder ────────────────────────────────────────────────────────────

/// Index of the raw EEG signal in the fixed channel list.
const RAW_SIGNAL: usize = 0;

/// Build the fixed 12-signal channel list with empty data arrays.
///
/// The physical ranges of the data-driven channels are inflated beyond the
/// observed extrema (+10 % above, and −10 % below for the band channels):
/// EDF clamps hard at the declared physical range, so a margin keeps samples
/// near the extrema from clipping.
pub fn build_signals(ranges: &ChannelRanges, config: &EdfConfig) -> Vec<EdfSignal> {
    let samples_per_record =
        |rate: u32| ((rate as f64 * config.data_record_duration).round().max(1.0)) as usize;
    let metric_spr = samples_per_record(METRIC_FREQUENCY);

    let mut signals = Vec::with_capacity(12);

    signals.push(EdfSignal {
        label: "EEG Fpz".into(),
        transducer: "Dry electrode".into(),
        physical_dimension: "uV".into(),
        physical_min: (ranges.raw.0 * 1.1).floor(),
        physical_max: (ranges.raw.1 * 1.1).ceil(),
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.5Hz LP:60Hz Notch:50Hz".into(),
        samples_per_record: samples_per_record(config.raw_rate),
        data: Vec::new(),
    });

    let metric = |label: &str, unit: &str, max: f64| EdfSignal {
        label: label.into(),
        transducer: "ThinkGear ASIC".into(),
        physical_dimension: unit.into(),
        physical_min: 0.0,
        physical_max: max,
        digital_min: 0,
        digital_max: max as i32,
        prefilter: "None".into(),
        samples_per_record: metric_spr,
        data: Vec::new(),
    };
    signals.push(metric("Attention", "%", 100.0));
    signals.push(metric("Meditation", "%", 100.0));
    signals.push(metric("Signal Quality", "level", 255.0));

    for (band, (name, range)) in BAND_NAMES.iter().zip(BAND_RANGES).enumerate() {
        let (lo, hi) = ranges.bands[band];
        signals.push(EdfSignal {
            label: format!("EEG {name}"),
            transducer: "ThinkGear ASIC".into(),
            physical_dimension: "uV^2/Hz".into(),
            physical_min: (lo * 0.9).floor(),
            physical_max: (hi * 1.1).ceil(),
            digital_min: 0,
            digital_max: 32767,
            prefilter: format!("BP:{range}"),
            samples_per_record: metric_spr,
            data: Vec::new(),
        });
    }

    signals
}

// ── Resampler ─────────────────────────────────────────────────────────────────

/// Seconds between the first and last row.
fn time_span(rows: &[Sample]) -> Result<f64> {
    let first = rows.first().ok_or(ConvertError::NoData)?;
    let last = rows.last().ok_or(ConvertError::NoData)?;
    let span = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
    if span <= 0.0 {
        return Err(ConvertError::EmptyTimeSpan);
    }
    Ok(span)
}

/// Map the asynchronous row timeline onto the fixed-rate signal grids.
///
/// Raw channel: `⌊span × rate⌋` target samples, each copied from the row at
/// the proportional *index* position.  1 Hz channels: for every whole second,
/// the mean of all rows within ±0.5 s of that instant (signal quality is
/// derived by inverting the logged poor-signal value); windows no row falls
/// into contribute a physical zero.
fn populate_signals(signals: &mut [EdfSignal], rows: &[Sample], span: f64, raw_rate: u32) {
    let t0 = rows[0].timestamp;
    let offsets: Vec<f64> = rows
        .iter()
        .map(|r| (r.timestamp - t0).num_milliseconds() as f64 / 1000.0)
        .collect();

    // Raw channel, nearest-neighbour over index space.
    let targets = (span * raw_rate as f64).floor() as usize;
    for i in 0..targets {
        let source = ((i as f64 / targets as f64) * rows.len() as f64) as usize;
        let source = source.min(rows.len() - 1);
        let value = rows[source].raw_wave as f64;
        let digital = signals[RAW_SIGNAL].to_digital(value);
        signals[RAW_SIGNAL].data.push(digital);
    }

    // Derived 1 Hz channels, one sample per whole second.
    let seconds = span.ceil() as usize;
    for s in 0..seconds {
        let centre = s as f64;
        let window: Vec<&Sample> = offsets
            .iter()
            .zip(rows)
            .filter(|(offset, _)| (*offset - centre).abs() <= 0.5)
            .map(|(_, row)| row)
            .collect();

        let mean = |values: &dyn Fn(&Sample) -> f64| -> f64 {
            if window.is_empty() {
                0.0
            } else {
                window.iter().map(|r| values(r)).sum::<f64>() / window.len() as f64
            }
        };

        let attention = mean(&|r: &Sample| r.attention as f64);
        let meditation = mean(&|r: &Sample| r.meditation as f64);
        let quality = mean(&|r: &Sample| 255.0 - r.poor_signal as f64);
        let values = [
            signals[1].to_digital(attention),
            signals[2].to_digital(meditation),
            signals[3].to_digital(quality),
        ];
        for (signal, digital) in signals[1..4].iter_mut().zip(values) {
            signal.data.push(digital);
        }
        for band in 0..8 {
            let power = mean(&move |r: &Sample| r.bands.as_array()[band] as f64);
            let digital = signals[4 + band].to_digital(power);
            signals[4 + band].data.push(digital);
        }
    }
}

// ── Recording ─────────────────────────────────────────────────────────────────

/// A fully prepared EDF file: all validation, resampling, and scaling is done
/// before a single byte is written, so a preparation failure never leaves a
/// partial file behind.
#[derive(Debug, Clone)]
pub struct EdfRecording {
    start: NaiveDateTime,
    record_duration: f64,
    n_records: usize,
    signals: Vec<EdfSignal>,
}

impl EdfRecording {
    /// Analyse, build, resample, and scale.  Fails without side effects when
    /// the log is empty or spans no time.
    pub fn prepare(rows: &[Sample], config: &EdfConfig) -> Result<Self> {
        let span = time_span(rows)?;
        let ranges = ChannelRanges::analyse(rows);
        let mut signals = build_signals(&ranges, config);
        populate_signals(&mut signals, rows, span, config.raw_rate);

        let raw = &signals[RAW_SIGNAL];
        if raw.data.is_empty() {
            return Err(ConvertError::EmptyTimeSpan);
        }
        let n_records =
            (raw.data.len() + raw.samples_per_record - 1) / raw.samples_per_record;

        Ok(Self {
            start: rows[0].timestamp,
            record_duration: config.data_record_duration,
            n_records,
            signals,
        })
    }

    /// Number of data records the file will contain.
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// The signal descriptors in channel order.
    pub fn signals(&self) -> &[EdfSignal] {
        &self.signals
    }

    /// Emit the complete file: main header, signal headers, data records.
    ///
    /// Any write failure aborts the conversion as a whole; a partial file may
    /// exist at the sink.  EDF readers tolerate truncation to varying degrees.
    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        let mut out = BufWriter::new(out);
        self.write_main_header(&mut out)?;
        self.write_signal_headers(&mut out)?;
        self.write_records(&mut out)?;
        out.flush()?;
        Ok(())
    }

    fn write_main_header<W: Write>(&self, out: &mut W) -> Result<()> {
        let ns = self.signals.len();
        let mut header = [b' '; MAIN_HEADER_LEN];

        put(&mut header, 0, 8, "0");
        put(&mut header, 8, 80, "NeuroSky EEG Recording");
        put(
            &mut header,
            88,
            80,
            &format!("StartDate: {}", self.start.format("%d.%m.%Y")),
        );
        put(
            &mut header,
            168,
            8,
            &format!(
                "{:02}.{:02}.{:02}",
                self.start.day(),
                self.start.month(),
                self.start.year() % 100
            ),
        );
        put(
            &mut header,
            176,
            8,
            &format!(
                "{:02}.{:02}.{:02}",
                self.start.hour(),
                self.start.minute(),
                self.start.second()
            ),
        );
        put(
            &mut header,
            184,
            8,
            &(MAIN_HEADER_LEN + SIGNAL_HEADER_LEN * ns).to_string(),
        );
        // Bytes 192..236 are the reserved field, left as spaces.
        put(&mut header, 236, 8, &self.n_records.to_string());
        put(&mut header, 244, 8, &format!("{:.2}", self.record_duration));
        put(&mut header, 252, 4, &ns.to_string());

        out.write_all(&header)?;
        Ok(())
    }

    /// The signal header block stores each field contiguously for *all*
    /// signals (all labels, then all transducers, …), not one signal at a
    /// time.
    fn write_signal_headers<W: Write>(&self, out: &mut W) -> Result<()> {
        let ns = self.signals.len();
        let mut block = vec![b' '; SIGNAL_HEADER_LEN * ns];
        let mut offset = 0;

        let mut field = |width: usize, text: &dyn Fn(&EdfSignal) -> String| {
            for (i, signal) in self.signals.iter().enumerate() {
                put(&mut block, offset + i * width, width, &text(signal));
            }
            offset += ns * width;
        };

        field(16, &|s| s.label.clone());
        field(80, &|s| s.transducer.clone());
        field(8, &|s| s.physical_dimension.clone());
        field(8, &|s| s.physical_min.to_string());
        field(8, &|s| s.physical_max.to_string());
        field(8, &|s| s.digital_min.to_string());
        field(8, &|s| s.digital_max.to_string());
        field(80, &|s| s.prefilter.clone());
        field(8, &|s| s.samples_per_record.to_string());
        field(32, &|_| String::new()); // reserved

        out.write_all(&block)?;
        Ok(())
    }

    fn write_records<W: Write>(&self, out: &mut W) -> Result<()> {
        for record in 0..self.n_records {
            for signal in &self.signals {
                let base = record * signal.samples_per_record;
                for i in 0..signal.samples_per_record {
                    let sample = signal.data.get(base + i).copied().unwrap_or(0);
                    out.write_all(&sample.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }
}

/// Copy `text` into `buf[start..start+width]`, truncated to the field width.
/// The buffer is pre-filled with spaces, which is also the EDF padding.
fn put(buf: &mut [u8], start: usize, width: usize, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(width);
    buf[start..start + len].copy_from_slice(&bytes[..len]);
}
