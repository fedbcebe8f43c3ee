//! A hardware-free byte source that speaks the ThinkGear wire protocol.
//!
//! Produces the same framed stream a real TGAM1 would: raw-wave frames at
//! ≈512 Hz and a burst of derived-metric frames once per second, all with
//! valid checksums.  Useful for demos without a headset (`mindwave
//! --simulate`) and for exercising the full live path in tests.
//!
//! The generated signal is deterministic — a stack of sine waves, no RNG —
//! so test assertions on it are stable.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crate::protocol::{
    encode_frame, CODE_ASIC_EEG_POWER, CODE_ATTENTION, CODE_MEDITATION, CODE_POOR_SIGNAL,
    CODE_RAW_WAVE, RAW_FREQUENCY,
};

/// Raw samples generated per [`Read::read`] call.
const SAMPLES_PER_CHUNK: u64 = 8;

/// A synthetic headset exposed as a blocking [`Read`] byte stream.
///
/// Each `read` call produces one chunk of frames and sleeps long enough to
/// approximate the real line rate, so the consumer experiences realistic
/// pacing.  Pass `paced: false` to generate as fast as the consumer reads
/// (tests have no reason to wait).
pub struct SimulatedHeadset {
    buffer: VecDeque<u8>,
    /// Raw samples generated so far; doubles as the time base.
    tick: u64,
    paced: bool,
}

impl SimulatedHeadset {
    pub fn new(paced: bool) -> Self {
        Self {
            buffer: VecDeque::new(),
            tick: 0,
            paced,
        }
    }

    /// Synthetic EEG: 10 Hz alpha riding on slower drift, ±150 µV-ish.
    fn raw_sample(&self) -> i16 {
        let t = self.tick as f64 / RAW_FREQUENCY as f64;
        let alpha = 120.0 * (2.0 * PI * 10.0 * t).sin();
        let drift = 40.0 * (2.0 * PI * 1.3 * t).sin();
        let jitter = 15.0 * (2.0 * PI * 47.0 * t).sin();
        (alpha + drift + jitter) as i16
    }

    /// Slowly wandering 0–100 metric, phase-shifted per channel.
    fn metric(&self, phase: f64) -> u8 {
        let t = self.tick as f64 / RAW_FREQUENCY as f64;
        (50.0 + 45.0 * (2.0 * PI * 0.05 * t + phase).sin()).round() as u8
    }

    fn push_frame(&mut self, payload: &[u8]) {
        self.buffer.extend(encode_frame(payload));
    }

    fn generate_chunk(&mut self) {
        for _ in 0..SAMPLES_PER_CHUNK {
            let raw = self.raw_sample().to_be_bytes();
            self.push_frame(&[CODE_RAW_WAVE, 0x02, raw[0], raw[1]]);
            self.tick += 1;

            // Once per simulated second, emit the derived metrics the way the
            // module batches them between raw samples.
            if self.tick % RAW_FREQUENCY as u64 == 0 {
                self.push_frame(&[CODE_POOR_SIGNAL, 0x00]);
                self.push_frame(&[CODE_ATTENTION, self.metric(0.0)]);
                self.push_frame(&[CODE_MEDITATION, self.metric(PI / 2.0)]);

                let mut payload = vec![CODE_ASIC_EEG_POWER, 24];
                for band in 0..8u32 {
                    let t = self.tick as f64 / RAW_FREQUENCY as f64;
                    let power =
                        (8000.0 / (band + 1) as f64 * (1.0 + 0.5 * (0.1 * t + band as f64).sin()))
                            as u32;
                    payload.extend_from_slice(&power.to_be_bytes()[1..4]);
                }
                self.push_frame(&payload);
            }
        }
    }
}

impl Read for SimulatedHeadset {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.is_empty() {
            self.generate_chunk();
            if self.paced {
                thread::sleep(Duration::from_millis(
                    1000 * SAMPLES_PER_CHUNK / RAW_FREQUENCY as u64,
                ));
            }
        }
        let mut n = 0;
        while n < buf.len() {
            match self.buffer.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
