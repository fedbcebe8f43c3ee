//! Byte-level decoders for the ThinkGear serial protocol.
//!
//! Everything here is pure with respect to I/O: [`FrameDecoder`] consumes one
//! byte at a time and never blocks or allocates in steady state, and
//! [`parse_payload`] walks a validated payload without touching anything
//! outside the slice it is given.  Both are safe to drive from any thread.
//!
//! # Frame layer vs. payload layer
//!
//! | Layer | Type | Input | Output |
//! |---|---|---|---|
//! | Framing | [`FrameDecoder`] | raw serial bytes | validated payload slices |
//! | Values | [`parse_payload`] | one payload | [`PayloadValue`]s |
//!
//! The decoder is deliberately forgiving: a bad length byte or a failed
//! checksum silently returns it to sync search.  Corruption is *expected* —
//! the stream is joined mid-flight at startup, and cheap serial dongles drop
//! bytes — so framing failures are not errors, just resynchronisation.

use log::debug;

use crate::protocol::{
    CODE_ASIC_EEG_POWER, CODE_ATTENTION, CODE_MEDITATION, CODE_POOR_SIGNAL, CODE_RAW_WAVE, EXCODE,
    MAX_PAYLOAD_LEN, SYNC,
};
use crate::types::{BandPowers, DataValue, PayloadValue};

// ── Frame decoder ─────────────────────────────────────────────────────────────

/// Decoder position within the frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Searching for the first sync byte.
    SyncFirst,
    /// One sync byte seen; a second confirms the frame boundary.
    SyncSecond,
    /// Double sync seen; expecting the payload length byte.  Additional sync
    /// bytes are absorbed here without leaving the state.
    Length,
    /// Accumulating `payload_length` payload bytes.
    Payload,
    /// Payload complete; expecting the checksum byte.
    Checksum,
}

/// Reassembles self-delimited, checksummed frames from a noisy byte stream.
///
/// One decoder owns the parser state for the lifetime of a byte stream.
/// Feed it every received byte in order; whenever a complete frame passes
/// its checksum, [`FrameDecoder::push`] hands back the payload:
///
/// ```
/// # use mindwave_rs::parse::FrameDecoder;
/// let mut decoder = FrameDecoder::new();
/// let mut payloads = Vec::new();
/// for &b in &[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB] {
///     if let Some(payload) = decoder.push(b) {
///         payloads.push(payload.to_vec());
///     }
/// }
/// assert_eq!(payloads, vec![vec![0x04, 0x40]]);
/// ```
///
/// The payload buffer is a fixed 256-byte array, so the decoder's memory
/// footprint is bounded no matter what arrives on the wire.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    payload_length: usize,
    payload_index: usize,
    payload: [u8; 256],
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::SyncFirst,
            payload_length: 0,
            payload_index: 0,
            payload: [0; 256],
        }
    }

    /// Feed one byte.  Returns the validated payload when this byte completes
    /// a frame whose checksum matches, `None` otherwise.
    ///
    /// Framing errors (length byte above [`MAX_PAYLOAD_LEN`], checksum
    /// mismatch) are not reported: the decoder returns to sync search and the
    /// next `0xAA 0xAA` boundary starts a fresh frame.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        match self.state {
            DecoderState::SyncFirst => {
                if byte == SYNC {
                    self.state = DecoderState::SyncSecond;
                }
                None
            }
            DecoderState::SyncSecond => {
                self.state = if byte == SYNC {
                    DecoderState::Length
                } else {
                    DecoderState::SyncFirst
                };
                None
            }
            DecoderState::Length => {
                if byte == SYNC {
                    // Extra sync bytes between frames are legal; stay put.
                } else if byte as usize > MAX_PAYLOAD_LEN {
                    self.state = DecoderState::SyncFirst;
                } else {
                    self.payload_length = byte as usize;
                    self.payload_index = 0;
                    self.state = if self.payload_length == 0 {
                        DecoderState::Checksum
                    } else {
                        DecoderState::Payload
                    };
                }
                None
            }
            DecoderState::Payload => {
                self.payload[self.payload_index] = byte;
                self.payload_index += 1;
                if self.payload_index >= self.payload_length {
                    self.state = DecoderState::Checksum;
                }
                None
            }
            DecoderState::Checksum => {
                self.state = DecoderState::SyncFirst;
                let payload = &self.payload[..self.payload_length];
                if crate::protocol::checksum(payload) == byte {
                    Some(payload)
                } else {
                    None
                }
            }
        }
    }

    /// Drop any partial frame and return to sync search, as if freshly
    /// constructed.  Call when switching byte sources.
    pub fn reset(&mut self) {
        self.state = DecoderState::SyncFirst;
        self.payload_length = 0;
        self.payload_index = 0;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Payload parser ────────────────────────────────────────────────────────────

/// Parse one validated payload into its tagged values.
///
/// Payload layout, repeated until the buffer is exhausted:
///
/// ```text
/// [0x55 × N]  [code]  ([length] when code ≥ 0x80)  [value bytes]
/// ```
///
/// Codes below `0x80` carry exactly one value byte and no length field.
/// Unknown codes are skipped over using their length so a single unfamiliar
/// tag cannot desynchronise the values after it.  A length field that runs
/// past the end of the payload aborts the remainder (the next frame is
/// independent, so nothing is lost beyond this payload).
pub fn parse_payload(payload: &[u8]) -> Vec<PayloadValue> {
    let mut values = Vec::new();
    let mut i = 0;

    while i < payload.len() {
        let mut extended_level = 0u8;
        while i < payload.len() && payload[i] == EXCODE {
            extended_level = extended_level.saturating_add(1);
            i += 1;
        }
        if i >= payload.len() {
            break;
        }

        let code = payload[i];
        i += 1;

        let length = if code & 0x80 != 0 {
            if i >= payload.len() {
                debug!("payload truncated before length byte of code 0x{code:02x}");
                break;
            }
            let l = payload[i] as usize;
            i += 1;
            l
        } else {
            1
        };

        if i + length > payload.len() {
            debug!(
                "payload truncated inside value of code 0x{code:02x}: \
                 need {length} bytes, {} remain",
                payload.len() - i
            );
            break;
        }
        let data = &payload[i..i + length];
        i += length;

        if let Some(value) = decode_value(code, data) {
            values.push(PayloadValue {
                extended_level,
                value,
            });
        } else {
            debug!("skipping unknown code 0x{code:02x} ({length} bytes)");
        }
    }

    values
}

/// Decode the value bytes of one known code.  Returns `None` for unknown
/// codes and for known codes whose value is too short to decode.
fn decode_value(code: u8, data: &[u8]) -> Option<DataValue> {
    match code {
        CODE_POOR_SIGNAL => data.first().map(|&b| DataValue::PoorSignal(b)),
        CODE_ATTENTION => data.first().map(|&b| DataValue::Attention(b)),
        CODE_MEDITATION => data.first().map(|&b| DataValue::Meditation(b)),
        CODE_RAW_WAVE => {
            if data.len() < 2 {
                return None;
            }
            Some(DataValue::RawWave(i16::from_be_bytes([data[0], data[1]])))
        }
        CODE_ASIC_EEG_POWER => {
            if data.len() < 24 {
                return None;
            }
            let mut powers = [0u32; 8];
            for (band, chunk) in powers.iter_mut().zip(data.chunks_exact(3)) {
                *band = decode_unsigned_24bit(chunk);
            }
            Some(DataValue::EegPower(BandPowers::from_array(powers)))
        }
        _ => None,
    }
}

/// Decode one 24-bit big-endian unsigned integer from a 3-byte group.
fn decode_unsigned_24bit(chunk: &[u8]) -> u32 {
    ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | (chunk[2] as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_frame;

    fn decode_all(bytes: &[u8]) -> Vec<PayloadValue> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for &b in bytes {
            if let Some(payload) = decoder.push(b) {
                out.extend(parse_payload(payload));
            }
        }
        out
    }

    #[test]
    fn minimal_poor_signal_frame() {
        let values = decode_all(&[0xAA, 0xAA, 0x02, 0x02, 0x00, 0xFD]);
        assert_eq!(
            values,
            vec![PayloadValue {
                extended_level: 0,
                value: DataValue::PoorSignal(0),
            }]
        );
    }

    #[test]
    fn attention_frame() {
        let values = decode_all(&[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB]);
        assert_eq!(values[0].value, DataValue::Attention(64));
    }

    #[test]
    fn bad_checksum_then_recovery() {
        // First frame carries a wrong checksum and must be discarded; the
        // second is accepted untouched.
        let bytes = [
            0xAA, 0xAA, 0x02, 0x04, 0x40, 0x00, // checksum should be 0xBB
            0xAA, 0xAA, 0x02, 0x04, 0x32, 0xC9,
        ];
        let values = decode_all(&bytes);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, DataValue::Attention(50));
    }

    #[test]
    fn leading_garbage_is_ignored() {
        // Arbitrary bytes before the first double-sync must not change what
        // is decoded.
        let mut bytes = vec![0x00, 0x13, 0xAA, 0x17, 0xFF];
        bytes.extend_from_slice(&[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB]);
        assert_eq!(
            decode_all(&bytes),
            decode_all(&[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB])
        );
    }

    #[test]
    fn oversized_length_forces_resync() {
        let mut bytes = vec![0xAA, 0xAA, 0xC0]; // 192 > 169: invalid length
        bytes.extend_from_slice(&[0xAA, 0xAA, 0x02, 0x05, 0x28, 0xD2]);
        let values = decode_all(&bytes);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, DataValue::Meditation(40));
    }

    #[test]
    fn extra_sync_bytes_are_absorbed() {
        let values = decode_all(&[0xAA, 0xAA, 0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB]);
        assert_eq!(values[0].value, DataValue::Attention(64));
    }

    #[test]
    fn raw_wave_value() {
        let frame = encode_frame(&[0x80, 0x02, 0x12, 0x34]);
        let values = decode_all(&frame);
        assert_eq!(values[0].value, DataValue::RawWave(0x1234));
    }

    #[test]
    fn raw_wave_is_signed() {
        let frame = encode_frame(&[0x80, 0x02, 0xFF, 0xFE]);
        let values = decode_all(&frame);
        assert_eq!(values[0].value, DataValue::RawWave(-2));
    }

    #[test]
    fn eeg_power_bands_in_wire_order() {
        let mut payload = vec![0x83, 0x18];
        for band in 1u8..=8 {
            payload.extend_from_slice(&[0x00, 0x00, band]);
        }
        let values = decode_all(&encode_frame(&payload));
        assert_eq!(
            values[0].value,
            DataValue::EegPower(BandPowers {
                delta: 1,
                theta: 2,
                low_alpha: 3,
                high_alpha: 4,
                low_beta: 5,
                high_beta: 6,
                low_gamma: 7,
                mid_gamma: 8,
            })
        );
    }

    #[test]
    fn multi_value_payload() {
        let values = decode_all(&encode_frame(&[0x02, 0x1A, 0x04, 0x40, 0x05, 0x2B]));
        assert_eq!(
            values.iter().map(|v| v.value.clone()).collect::<Vec<_>>(),
            vec![
                DataValue::PoorSignal(0x1A),
                DataValue::Attention(0x40),
                DataValue::Meditation(0x2B),
            ]
        );
    }

    #[test]
    fn unknown_code_is_skipped_without_desync() {
        // 0x03 (heart rate on some firmware) is unknown here; the attention
        // value after it must still decode.
        let values = decode_all(&encode_frame(&[0x03, 0x48, 0x04, 0x40]));
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, DataValue::Attention(64));
    }

    #[test]
    fn unknown_long_code_consumes_its_length() {
        // An unknown multi-byte code (high bit set) must advance the cursor
        // by its declared length.
        let values = decode_all(&encode_frame(&[0x90, 0x03, 0x01, 0x02, 0x03, 0x04, 0x40]));
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, DataValue::Attention(64));
    }

    #[test]
    fn extended_code_level_is_preserved() {
        let values = decode_all(&encode_frame(&[0x55, 0x55, 0x04, 0x40]));
        assert_eq!(
            values,
            vec![PayloadValue {
                extended_level: 2,
                value: DataValue::Attention(64),
            }]
        );
    }

    #[test]
    fn truncated_length_field_aborts_payload() {
        // Code 0x80 claims 4 value bytes but only 2 remain: the whole rest of
        // the payload is abandoned, nothing bogus is emitted.
        let values = decode_all(&encode_frame(&[0x80, 0x04, 0x12, 0x34]));
        assert!(values.is_empty());
    }

    #[test]
    fn empty_payload_yields_nothing() {
        // A zero-length payload is a legal frame with checksum 0xFF.
        let values = decode_all(&[0xAA, 0xAA, 0x00, 0xFF]);
        assert!(values.is_empty());
    }

    #[test]
    fn decoder_reset_drops_partial_frame() {
        let mut decoder = FrameDecoder::new();
        for &b in &[0xAA, 0xAA, 0x02, 0x04] {
            assert!(decoder.push(b).is_none());
        }
        decoder.reset();
        let mut got = None;
        for &b in &[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB] {
            if let Some(p) = decoder.push(b) {
                got = Some(p.to_vec());
            }
        }
        assert_eq!(got.as_deref(), Some(&[0x04u8, 0x40][..]));
    }
}
