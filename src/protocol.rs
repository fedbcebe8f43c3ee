//! ThinkGear wire-format constants and frame helpers.
//!
//! The TGAM1 module streams a framed serial protocol at 57600 baud 8N1:
//!
//! ```text
//! [0xAA] [0xAA] [length] [payload × length] [checksum]
//! ```
//!
//! The payload is a sequence of tagged values (see [`crate::parse`]); the
//! checksum is the one's complement of the low byte of the payload sum.

// ── Framing ──────────────────────────────────────────────────────────────────

/// Frame synchronisation byte.  Every frame starts with two of these.
pub const SYNC: u8 = 0xAA;

/// Extended-code prefix byte.  Each `0x55` before a value code raises the
/// value's extended-code level by one.  The standard protocol only defines
/// level 0, but the level is preserved through parsing so future codes can
/// be dispatched without changing the frame layout.
pub const EXCODE: u8 = 0x55;

/// Largest payload the protocol allows.  A length byte above this is a
/// framing error and forces resynchronisation.
pub const MAX_PAYLOAD_LEN: usize = 169;

// ── Value codes ───────────────────────────────────────────────────────────────

/// Signal quality: one byte, 0 = perfect contact, 200 = electrode off skin,
/// 255 = no contact at all.
pub const CODE_POOR_SIGNAL: u8 = 0x02;

/// eSense attention metric, one byte, 0–100.
pub const CODE_ATTENTION: u8 = 0x04;

/// eSense meditation metric, one byte, 0–100.
pub const CODE_MEDITATION: u8 = 0x05;

/// One raw EEG sample: two bytes, big-endian, signed two's complement.
///
/// Documentation across TGAM firmware revisions disagrees on the sign
/// convention for this field; this crate follows the signed interpretation.
pub const CODE_RAW_WAVE: u8 = 0x80;

/// Eight spectral band powers: 24 bytes, eight 3-byte big-endian unsigned
/// integers in [`BAND_NAMES`] order.
pub const CODE_ASIC_EEG_POWER: u8 = 0x83;

// ── Sampling constants ────────────────────────────────────────────────────────

/// Raw EEG sample rate in Hz as declared by the TGAM1 datasheet.
///
/// The module does not timestamp samples; this rate is what the EDF export
/// declares for the raw channel.
pub const RAW_FREQUENCY: u32 = 512;

/// Rate at which the derived metrics (signal quality, eSense values, band
/// powers) arrive, in Hz.
pub const METRIC_FREQUENCY: u32 = 1;

/// Default serial line speed for TGAM1 modules and MindWave dongles.
pub const DEFAULT_BAUD_RATE: u32 = 57600;

// ── Human-readable labels ─────────────────────────────────────────────────────

/// Spectral band names in ASIC_EEG_POWER wire order.
pub const BAND_NAMES: [&str; 8] = [
    "Delta", "Theta", "LowAlpha", "HighAlpha", "LowBeta", "HighBeta", "LowGamma", "MidGamma",
];

/// Frequency span of each band, in [`BAND_NAMES`] order, as printed into the
/// EDF prefilter field of the band-power channels.
pub const BAND_RANGES: [&str; 8] = [
    "0.5-2.75Hz",
    "3.5-6.75Hz",
    "7.5-9.25Hz",
    "10-11.75Hz",
    "13-16.75Hz",
    "18-29.75Hz",
    "31-39.75Hz",
    "41-49.75Hz",
];

// ── Checksum and frame encoding ───────────────────────────────────────────────

/// Compute the frame checksum over a payload.
///
/// The trailing checksum byte of a frame equals the bitwise inverse of the
/// low byte of the payload sum:
///
/// ```
/// # use mindwave_rs::protocol::checksum;
/// assert_eq!(checksum(&[0x02, 0x00]), 0xFD);
/// assert_eq!(checksum(&[0x04, 0x40]), 0xBB);
/// ```
pub fn checksum(payload: &[u8]) -> u8 {
    !payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode a payload into a complete frame: double sync, length byte, payload,
/// checksum.
///
/// Used by the simulator and by tests; the headset side of the link never
/// receives frames, only single-character configuration bytes.
///
/// # Panics
/// Panics if `payload` exceeds [`MAX_PAYLOAD_LEN`] bytes.
///
/// ```
/// # use mindwave_rs::protocol::encode_frame;
/// assert_eq!(encode_frame(&[0x04, 0x40]), &[0xAA, 0xAA, 0x02, 0x04, 0x40, 0xBB]);
/// ```
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    assert!(
        payload.len() <= MAX_PAYLOAD_LEN,
        "payload of {} bytes exceeds protocol maximum of {MAX_PAYLOAD_LEN}",
        payload.len()
    );
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(SYNC);
    frame.push(SYNC);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_inverts_payload_sum() {
        assert_eq!(checksum(&[]), 0xFF);
        assert_eq!(checksum(&[0x02, 0x00]), 0xFD);
        // Sum overflow wraps before inversion.
        assert_eq!(checksum(&[0xFF, 0xFF, 0x03]), !0x01u8);
    }

    #[test]
    fn encode_frame_layout() {
        let frame = encode_frame(&[0x02, 0x00]);
        assert_eq!(frame, &[0xAA, 0xAA, 0x02, 0x02, 0x00, 0xFD]);
    }

    #[test]
    #[should_panic]
    fn encode_frame_rejects_oversized_payload() {
        encode_frame(&[0u8; MAX_PAYLOAD_LEN + 1]);
    }
}
