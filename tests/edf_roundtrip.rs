//! End-to-end conversion: write a log through the live pipeline types, read
//! it back, convert to EDF, and verify the emitted bytes.

use std::fs;

use chrono::NaiveDate;

use mindwave_rs::edf::{EdfConfig, EdfRecording};
use mindwave_rs::recording::{read_rows, RowWriter};
use mindwave_rs::types::{BandPowers, Sample};

/// Ten rows at whole seconds 0..=9 — attention climbing 10, 20, … 100,
/// meditation pinned at 50.
fn synthetic_rows() -> Vec<Sample> {
    (0..10i64)
        .map(|i| {
            let timestamp = NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(22, 15, 0)
                .unwrap()
                + chrono::Duration::seconds(i);
            Sample {
                attention: (10 * (i + 1)) as u8,
                meditation: 50,
                poor_signal: 0,
                raw_wave: (i as i16 - 5) * 50,
                signal_quality: 255,
                bands: BandPowers::from_array([80, 70, 60, 50, 40, 30, 20, 10]),
                ..Sample::new(timestamp)
            }
        })
        .collect()
}

#[test]
fn csv_to_edf_round_trip() {
    let csv_path = "test_roundtrip.csv";
    let edf_path = "test_roundtrip.edf";

    // ── Write the log the way the live path would ─────────────────────────────
    {
        let mut writer = RowWriter::create(csv_path).unwrap();
        for row in synthetic_rows() {
            writer.append(&row).unwrap();
        }
    }

    // ── Read back and convert ─────────────────────────────────────────────────
    let rows = read_rows(csv_path).unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows, synthetic_rows());

    let recording = EdfRecording::prepare(&rows, &EdfConfig::default()).unwrap();
    recording.write_to(fs::File::create(edf_path).unwrap()).unwrap();
    let bytes = fs::read(edf_path).unwrap();

    fs::remove_file(csv_path).ok();
    fs::remove_file(edf_path).ok();

    // ── Shape ─────────────────────────────────────────────────────────────────
    // Rows at seconds 0..=9 span 9 s: 9 one-second records.
    let n_records = 9;
    let n_signals = 12;
    assert_eq!(recording.n_records(), n_records);

    let header_len = 256 + 256 * n_signals;
    let record_len = 2 * (512 + 11); // raw channel + 11 one-sample channels
    assert_eq!(bytes.len(), header_len + n_records * record_len);

    // ── Main header fields ────────────────────────────────────────────────────
    let text = |lo: usize, hi: usize| std::str::from_utf8(&bytes[lo..hi]).unwrap();
    assert_eq!(text(0, 8), "0       ");
    assert_eq!(text(168, 176), "15.03.24");
    assert_eq!(text(176, 184), "22.15.00");
    assert_eq!(text(236, 244).trim_end(), "9");
    assert_eq!(text(244, 252).trim_end(), "1.00");
    assert_eq!(text(252, 256).trim_end(), "12");

    // ── Per-record samples ────────────────────────────────────────────────────
    let sample_at = |record: usize, offset: usize| -> i16 {
        let base = header_len + record * record_len + offset * 2;
        i16::from_le_bytes([bytes[base], bytes[base + 1]])
    };

    for record in 0..n_records {
        // Attention is the first derived channel after the 512 raw samples.
        // Its physical and digital ranges coincide, so the digital values are
        // the logged values: 10, 20, … 90.
        assert_eq!(sample_at(record, 512), (10 * (record + 1)) as i16);
        // Meditation holds at 50, signal quality at 255.
        assert_eq!(sample_at(record, 513), 50);
        assert_eq!(sample_at(record, 514), 255);
    }

    // Raw channel: 9 × 512 samples were populated, none padded; the first
    // record's raw samples all come from the earliest rows.
    let raw = &recording.signals()[0];
    assert_eq!(raw.data.len(), n_records * 512);
    let first_physical = raw.to_physical(sample_at(0, 0));
    assert!((first_physical - (-250.0)).abs() <= 1.0);
}

#[test]
fn conversion_fails_cleanly_on_empty_log() {
    let csv_path = "test_roundtrip_empty.csv";
    {
        RowWriter::create(csv_path).unwrap();
    }
    let rows = read_rows(csv_path).unwrap();
    fs::remove_file(csv_path).ok();

    assert!(rows.is_empty());
    assert!(EdfRecording::prepare(&rows, &EdfConfig::default()).is_err());
}
