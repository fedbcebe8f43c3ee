//! Merges decoded values into the current sample and emits log rows.
//!
//! The headset interleaves value kinds at wildly different rates: raw wave at
//! ≈512 Hz, everything else at ≈1 Hz.  The aggregator keeps one mutable
//! [`Sample`] with the last observed value of every channel and appends it to
//! the log whenever a *trigger* value arrives — signal quality, attention,
//! meditation, or band powers.  Raw-wave values update state silently.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use log::warn;

use crate::recording::RowWriter;
use crate::types::{DataValue, PayloadValue, Sample};

/// Snapshot of everything the control context may observe.
///
/// Lives behind an `Arc<Mutex<…>>` shared between the reader thread (which
/// mutates it) and status readers (which clone it).  The lock is only held
/// for field updates, never across I/O, so readers always see a consistent
/// sample and never stall on a slow disk.
#[derive(Debug, Clone)]
pub struct HeadsetStatus {
    /// Last observed value of every channel.
    pub sample: Sample,
    /// Wall clock of the most recent update of *any* kind, including silent
    /// raw-wave updates.  Staleness here means the stream has gone quiet.
    pub last_update: NaiveDateTime,
}

impl HeadsetStatus {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            sample: Sample::new(now),
            last_update: now,
        }
    }
}

/// Owns the trigger-emit policy and the row sink.
///
/// Driven from the reader thread; one aggregator per byte stream.
pub struct SampleAggregator {
    status: Arc<Mutex<HeadsetStatus>>,
    sink: Option<RowWriter>,
}

impl SampleAggregator {
    /// `sink` may be `None` to aggregate without persisting (status-only
    /// streaming, tests).
    pub fn new(status: Arc<Mutex<HeadsetStatus>>, sink: Option<RowWriter>) -> Self {
        Self { status, sink }
    }

    /// Apply one decoded value.  Returns the emitted sample when the value
    /// was a trigger, `None` for silent updates.
    ///
    /// Values at extended-code levels above 0 are ignored entirely; no codes
    /// are defined there.
    ///
    /// A sink write failure drops that one row and keeps the stream alive.
    pub fn handle(&mut self, value: &PayloadValue) -> Option<Sample> {
        if value.extended_level != 0 {
            return None;
        }

        let now = Local::now().naive_local();
        let emitted = {
            let mut status = self.status.lock().expect("headset status lock poisoned");
            status.last_update = now;

            let trigger = match value.value {
                DataValue::PoorSignal(quality) => {
                    status.sample.poor_signal = quality;
                    true
                }
                DataValue::Attention(level) => {
                    status.sample.attention = level;
                    true
                }
                DataValue::Meditation(level) => {
                    status.sample.meditation = level;
                    true
                }
                DataValue::RawWave(sample) => {
                    status.sample.raw_wave = sample;
                    false
                }
                DataValue::EegPower(bands) => {
                    status.sample.bands = bands;
                    true
                }
            };

            if trigger {
                status.sample.timestamp = now;
                status.sample.signal_quality = 255 - status.sample.poor_signal;
                Some(status.sample.clone())
            } else {
                None
            }
        };

        if let Some(sample) = &emitted {
            if let Some(sink) = &mut self.sink {
                if let Err(e) = sink.append(sample) {
                    warn!("dropping row, log write failed: {e}");
                }
            }
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BandPowers;

    fn aggregator() -> (SampleAggregator, Arc<Mutex<HeadsetStatus>>) {
        let status = Arc::new(Mutex::new(HeadsetStatus::new(Local::now().naive_local())));
        (SampleAggregator::new(Arc::clone(&status), None), status)
    }

    fn level0(value: DataValue) -> PayloadValue {
        PayloadValue {
            extended_level: 0,
            value,
        }
    }

    #[test]
    fn trigger_values_emit() {
        let (mut agg, _) = aggregator();
        assert!(agg.handle(&level0(DataValue::PoorSignal(0))).is_some());
        assert!(agg.handle(&level0(DataValue::Attention(64))).is_some());
        assert!(agg.handle(&level0(DataValue::Meditation(40))).is_some());
        assert!(agg
            .handle(&level0(DataValue::EegPower(BandPowers::default())))
            .is_some());
    }

    #[test]
    fn raw_wave_updates_silently() {
        let (mut agg, status) = aggregator();
        assert!(agg.handle(&level0(DataValue::RawWave(4660))).is_none());
        assert_eq!(status.lock().unwrap().sample.raw_wave, 4660);
    }

    #[test]
    fn signal_quality_inverts_poor_signal() {
        let (mut agg, _) = aggregator();
        let emitted = agg.handle(&level0(DataValue::PoorSignal(0))).unwrap();
        assert_eq!(emitted.signal_quality, 255);

        let emitted = agg.handle(&level0(DataValue::PoorSignal(200))).unwrap();
        assert_eq!(emitted.signal_quality, 55);
    }

    #[test]
    fn values_persist_across_emits() {
        let (mut agg, _) = aggregator();
        agg.handle(&level0(DataValue::Attention(64)));
        agg.handle(&level0(DataValue::RawWave(-7)));
        let emitted = agg.handle(&level0(DataValue::Meditation(40))).unwrap();
        // The meditation trigger carries the earlier attention and raw values.
        assert_eq!(emitted.attention, 64);
        assert_eq!(emitted.meditation, 40);
        assert_eq!(emitted.raw_wave, -7);
    }

    #[test]
    fn extended_levels_are_ignored() {
        let (mut agg, status) = aggregator();
        let value = PayloadValue {
            extended_level: 1,
            value: DataValue::Attention(90),
        };
        assert!(agg.handle(&value).is_none());
        assert_eq!(status.lock().unwrap().sample.attention, 0);
    }

    #[test]
    fn last_update_tracks_silent_updates() {
        let (mut agg, status) = aggregator();
        let before = status.lock().unwrap().last_update;
        agg.handle(&level0(DataValue::RawWave(1)));
        assert!(status.lock().unwrap().last_update >= before);
    }
}
