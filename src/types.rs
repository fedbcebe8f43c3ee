use chrono::NaiveDateTime;

/// The eight ASIC spectral band powers from one `ASIC_EEG_POWER` value.
///
/// Each power is a 24-bit unsigned integer straight off the wire, in
/// relative ASIC units (the TGAM1 does not document an absolute scale).
/// Wire order matches [`crate::protocol::BAND_NAMES`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BandPowers {
    /// 0.5–2.75 Hz
    pub delta: u32,
    /// 3.5–6.75 Hz
    pub theta: u32,
    /// 7.5–9.25 Hz
    pub low_alpha: u32,
    /// 10–11.75 Hz
    pub high_alpha: u32,
    /// 13–16.75 Hz
    pub low_beta: u32,
    /// 18–29.75 Hz
    pub high_beta: u32,
    /// 31–39.75 Hz
    pub low_gamma: u32,
    /// 41–49.75 Hz
    pub mid_gamma: u32,
}

impl BandPowers {
    /// The band powers as an array in wire order (see
    /// [`crate::protocol::BAND_NAMES`]).
    pub fn as_array(&self) -> [u32; 8] {
        [
            self.delta,
            self.theta,
            self.low_alpha,
            self.high_alpha,
            self.low_beta,
            self.high_beta,
            self.low_gamma,
            self.mid_gamma,
        ]
    }

    /// Build from an array in wire order.
    pub fn from_array(powers: [u32; 8]) -> Self {
        Self {
            delta: powers[0],
            theta: powers[1],
            low_alpha: powers[2],
            high_alpha: powers[3],
            low_beta: powers[4],
            high_beta: powers[5],
            low_gamma: powers[6],
            mid_gamma: powers[7],
        }
    }
}

/// One decoded ThinkGear value.
///
/// Produced by [`crate::parse::parse_payload`].  Codes the parser does not
/// recognise are consumed (their length field keeps the cursor in sync) but
/// not represented here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// Signal quality, 0 = perfect, 255 = off-head.  Code `0x02`.
    PoorSignal(u8),
    /// eSense attention, 0–100.  Code `0x04`.
    Attention(u8),
    /// eSense meditation, 0–100.  Code `0x05`.
    Meditation(u8),
    /// One raw EEG sample, signed big-endian 16-bit.  Code `0x80`.
    RawWave(i16),
    /// Eight spectral band powers.  Code `0x83`.
    EegPower(BandPowers),
}

/// A [`DataValue`] together with its extended-code level.
///
/// The standard protocol only defines codes at level 0; the level is carried
/// anyway so that a future firmware using `0x55` prefixes can be dispatched
/// without touching the parser.  The aggregator ignores levels above 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadValue {
    /// Number of `0x55` prefix bytes that preceded the value code.
    pub extended_level: u8,
    pub value: DataValue,
}

/// The most recent value of every channel the headset reports.
///
/// Every field is last-observed-wins; nothing is interpolated or invented.
/// A sample is persisted as one CSV row whenever a trigger value arrives
/// (signal quality, either eSense metric, or band powers — raw wave updates
/// are deliberately silent, at 512 Hz they would swamp a human-readable log).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Host wall clock at the moment the row was emitted.
    ///
    /// The TGAM1 carries no clock of its own, so the host is authoritative.
    pub timestamp: NaiveDateTime,
    /// eSense attention, 0–100.
    pub attention: u8,
    /// eSense meditation, 0–100.
    pub meditation: u8,
    /// Raw contact-quality value as reported: 0 = perfect, 255 = off-head.
    pub poor_signal: u8,
    /// Most recent raw EEG sample.
    pub raw_wave: i16,
    /// Inverted contact quality (`255 − poor_signal`), so that bigger means
    /// better; recomputed at every emission.
    pub signal_quality: u8,
    /// Most recent spectral band powers.
    pub bands: BandPowers,
}

impl Sample {
    /// A zeroed sample stamped with the given time.
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            attention: 0,
            meditation: 0,
            poor_signal: 0,
            raw_wave: 0,
            signal_quality: 0,
            bands: BandPowers::default(),
        }
    }
}

/// All events emitted by [`crate::client::MindwaveClient`].
///
/// Consumers receive these through the receiver returned by
/// [`crate::client::MindwaveClient::connect`] or
/// [`crate::client::MindwaveClient::stream_from_reader`].
#[derive(Debug, Clone)]
pub enum MindwaveEvent {
    /// The byte source is open and the reader loop is running.  The inner
    /// `String` names the source (a serial port path, or `"<reader>"`).
    Connected(String),
    /// A row was emitted: a trigger value arrived and the current sample was
    /// appended to the log.
    Sample(Sample),
    /// A raw EEG sample arrived (≈512 Hz).  Updates state silently; no row
    /// is written for these.
    Raw(i16),
    /// The byte source reached end of stream, failed permanently, or shutdown
    /// was requested.  No further events will arrive on this channel.
    Disconnected,
}
