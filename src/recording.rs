//! The on-disk sample log: a semicolon-delimited CSV file.
//!
//! One row per emitted [`Sample`], appended live and flushed immediately so a
//! crash never loses more than the row in flight.  The same file is read back
//! by the offline EDF converter, so writer and reader live side by side here
//! and share one schema.

use std::fs::File;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::debug;

use crate::types::{BandPowers, Sample};

/// Column order of the log file.  The first line of every log is exactly
/// these names joined with `;`.
pub const COLUMNS: [&str; 14] = [
    "Timestamp",
    "Attention",
    "Meditation",
    "PoorSignal",
    "RawWave",
    "SignalQuality",
    "Delta",
    "Theta",
    "LowAlpha",
    "HighAlpha",
    "LowBeta",
    "HighBeta",
    "LowGamma",
    "MidGamma",
];

/// Timestamp column format, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ── Writer ────────────────────────────────────────────────────────────────────

/// Append-only log writer.
///
/// Flushes after every row so the log survives unplugging the dongle or
/// killing the process mid-recording.
pub struct RowWriter {
    writer: csv::Writer<File>,
}

impl RowWriter {
    /// Create the log file, truncating any existing file at `path`, and write
    /// the header row.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = WriterBuilder::new().delimiter(b';').from_writer(file);
        writer.write_record(COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append one sample and flush it to disk.
    pub fn append(&mut self, sample: &Sample) -> io::Result<()> {
        let bands = sample.bands.as_array();
        self.writer.write_record([
            sample.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            sample.attention.to_string(),
            sample.meditation.to_string(),
            sample.poor_signal.to_string(),
            sample.raw_wave.to_string(),
            sample.signal_quality.to_string(),
            bands[0].to_string(),
            bands[1].to_string(),
            bands[2].to_string(),
            bands[3].to_string(),
            bands[4].to_string(),
            bands[5].to_string(),
            bands[6].to_string(),
            bands[7].to_string(),
        ])?;
        self.writer.flush()
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Read every parseable row of a log file.
///
/// Rows that fail to parse (truncated tail after a crash, a stray editor
/// save, wrong column count) are skipped with a debug log rather than
/// aborting: the remaining rows are still worth converting.
pub fn read_rows<P: AsRef<Path>>(path: P) -> io::Result<Vec<Sample>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!("skipping unreadable row {}: {e}", index + 2);
                continue;
            }
        };
        match parse_row(&record) {
            Some(sample) => rows.push(sample),
            None => debug!("skipping unparseable row {}: {:?}", index + 2, record),
        }
    }
    Ok(rows)
}

fn parse_row(record: &StringRecord) -> Option<Sample> {
    if record.len() < COLUMNS.len() {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(record.get(0)?.trim(), TIMESTAMP_FORMAT).ok()?;

    fn field<T: std::str::FromStr>(record: &StringRecord, i: usize) -> Option<T> {
        record.get(i)?.trim().parse().ok()
    }

    let mut bands = [0u32; 8];
    for (offset, band) in bands.iter_mut().enumerate() {
        *band = field(record, 6 + offset)?;
    }

    Some(Sample {
        timestamp,
        attention: field(record, 1)?,
        meditation: field(record, 2)?,
        poor_signal: field(record, 3)?,
        raw_wave: field(record, 4)?,
        signal_quality: field(record, 5)?,
        bands: BandPowers::from_array(bands),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use std::io::Write;

    fn sample_at(secs: u32, attention: u8) -> Sample {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_milli_opt(10, 30, secs, 250)
            .unwrap();
        Sample {
            attention,
            meditation: 50,
            poor_signal: 0,
            raw_wave: -120,
            signal_quality: 255,
            bands: BandPowers::from_array([1, 2, 3, 4, 5, 6, 7, 8]),
            ..Sample::new(timestamp)
        }
    }

    #[test]
    fn write_then_read_round_trip() {
        let path = "test_rows_roundtrip.csv";
        {
            let mut writer = RowWriter::create(path).unwrap();
            writer.append(&sample_at(0, 10)).unwrap();
            writer.append(&sample_at(1, 20)).unwrap();
        }
        let rows = read_rows(path).unwrap();
        fs::remove_file(path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], sample_at(0, 10));
        assert_eq!(rows[1].attention, 20);
        assert_eq!(rows[1].raw_wave, -120);
    }

    #[test]
    fn header_row_matches_schema() {
        let path = "test_rows_header.csv";
        {
            let mut writer = RowWriter::create(path).unwrap();
            writer.append(&sample_at(0, 10)).unwrap();
        }
        let text = fs::read_to_string(path).unwrap();
        fs::remove_file(path).ok();

        let first_line = text.lines().next().unwrap();
        assert_eq!(
            first_line,
            "Timestamp;Attention;Meditation;PoorSignal;RawWave;SignalQuality;\
             Delta;Theta;LowAlpha;HighAlpha;LowBeta;HighBeta;LowGamma;MidGamma"
        );
        assert!(text.lines().nth(1).unwrap().starts_with("2024-03-15 10:30:00.250;10;50;0;"));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let path = "test_rows_bad.csv";
        {
            let mut writer = RowWriter::create(path).unwrap();
            writer.append(&sample_at(0, 10)).unwrap();
        }
        {
            let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
            writeln!(file, "not a timestamp;1;2;3;4;5;6;7;8;9;10;11;12;13").unwrap();
            writeln!(file, "2024-03-15 10:30:05.000;99").unwrap();
        }
        {
            let mut writer_bytes = fs::OpenOptions::new().append(true).open(path).unwrap();
            // A fully valid row after the damage must still be read.
            writeln!(
                writer_bytes,
                "2024-03-15 10:30:06.000;42;50;0;-120;255;1;2;3;4;5;6;7;8"
            )
            .unwrap();
        }
        let rows = read_rows(path).unwrap();
        fs::remove_file(path).ok();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].attention, 10);
        assert_eq!(rows[1].attention, 42);
    }

    #[test]
    fn quoted_fields_are_accepted() {
        let path = "test_rows_quoted.csv";
        fs::write(
            path,
            "Timestamp;Attention;Meditation;PoorSignal;RawWave;SignalQuality;\
             Delta;Theta;LowAlpha;HighAlpha;LowBeta;HighBeta;LowGamma;MidGamma\n\
             \"2024-03-15 10:30:00.250\";10;50;0;-120;255;1;2;3;4;5;6;7;8\n",
        )
        .unwrap();
        let rows = read_rows(path).unwrap();
        fs::remove_file(path).ok();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], sample_at(0, 10));
    }
}
