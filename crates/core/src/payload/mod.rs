//! RTP payload type descriptors (RFC 3551 §6).
//!
//! A [`PayloadType`] describes what the payload of an RTP packet carries:
//! the MIME subtype used in SDP (`PCMU`, `opus`, `H264`), the media clock
//! rate that drives the RTP timestamp, and the channel count.
//!
//! Payload types are stored in a [`Profile`](crate::Profile) slot whose
//! index is the 7-bit payload type number written on the wire. They are
//! handed around as `Arc<PayloadType>` so several profiles can share one
//! descriptor.
//!
//! ## Mutability
//!
//! The codec descriptor (MIME, clock rate, channels, kind, sample size,
//! bitrate) is fixed at construction. The attributes that change during
//! offer/answer negotiation (send and receive fmtp, [`PayloadFlags`]) sit
//! behind an internal lock, so an update through one `Arc` is seen by every
//! profile sharing that `Arc` and by none holding a deep copy.

mod flags;

use std::fmt;
use std::time::Duration;

use parking_lot::RwLock;

pub use flags::PayloadFlags;

/// Number of payload slots in a profile (7-bit PT field, RFC 3550 §5.1).
pub const MAX_PAYLOAD_TYPES: usize = 128;

/// First payload type number of the dynamic range (RFC 3551 §3).
pub const DYNAMIC_PAYLOAD_MIN: u8 = 96;

/// Broad media class of a payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    /// Text, events and anything not audio or video.
    Other,
}

impl MediaKind {
    /// SDP media name used in `m=` lines.
    pub fn sdp_media(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Other => "application",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Negotiated {
    send_fmtp: Option<String>,
    recv_fmtp: Option<String>,
    flags: PayloadFlags,
}

/// Codec descriptor for one RTP payload type.
#[derive(Debug)]
pub struct PayloadType {
    mime_type: String,
    clock_rate: u32,
    channels: u16,
    kind: MediaKind,
    bits_per_sample: u16,
    normal_bitrate: u32,
    negotiated: RwLock<Negotiated>,
}

impl PayloadType {
    /// Create a descriptor.
    ///
    /// # Panics
    ///
    /// If `clock_rate` is zero. Every RTP payload has a media clock.
    pub fn new(kind: MediaKind, mime_type: &str, clock_rate: u32, channels: u16) -> Self {
        assert!(clock_rate > 0, "payload clock rate must be non-zero");
        Self {
            mime_type: mime_type.to_string(),
            clock_rate,
            channels,
            kind,
            bits_per_sample: 0,
            normal_bitrate: 0,
            negotiated: RwLock::new(Negotiated::default()),
        }
    }

    pub fn audio(mime_type: &str, clock_rate: u32, channels: u16) -> Self {
        Self::new(MediaKind::Audio, mime_type, clock_rate, channels)
    }

    /// Video payloads are single-channel by convention.
    pub fn video(mime_type: &str, clock_rate: u32) -> Self {
        Self::new(MediaKind::Video, mime_type, clock_rate, 1)
    }

    pub fn with_bits_per_sample(mut self, bits: u16) -> Self {
        self.bits_per_sample = bits;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.normal_bitrate = bitrate;
        self
    }

    pub fn with_send_fmtp(mut self, fmtp: &str) -> Self {
        self.negotiated.get_mut().send_fmtp = Some(fmtp.to_string());
        self
    }

    pub fn with_flags(mut self, flags: PayloadFlags) -> Self {
        self.negotiated.get_mut().flags = flags;
        self
    }

    /// DTMF events, RFC 4733.
    pub fn telephone_event() -> Self {
        Self::new(MediaKind::Other, "telephone-event", 8000, 1)
    }

    /// Opus always advertises 48 kHz stereo in SDP (RFC 7587 §7).
    pub fn opus() -> Self {
        Self::audio("opus", 48000, 2).with_flags(PayloadFlags::VBR)
    }

    pub fn h264() -> Self {
        Self::video("H264", 90000).with_send_fmtp("packetization-mode=1")
    }

    pub fn vp8() -> Self {
        Self::video("VP8", 90000)
    }

    /// MIME subtype / SDP encoding name.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Media clock rate in Hz.
    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Bits per sample for sample-based codecs, 0 when not applicable.
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Nominal bitrate in bits per second, 0 when unknown.
    pub fn normal_bitrate(&self) -> u32 {
        self.normal_bitrate
    }

    /// True for RFC 4733 telephone events.
    pub fn is_telephone_event(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("telephone-event")
    }

    pub fn send_fmtp(&self) -> Option<String> {
        self.negotiated.read().send_fmtp.clone()
    }

    pub fn recv_fmtp(&self) -> Option<String> {
        self.negotiated.read().recv_fmtp.clone()
    }

    pub fn set_send_fmtp(&self, fmtp: Option<&str>) {
        self.negotiated.write().send_fmtp = fmtp.map(str::to_string);
    }

    pub fn set_recv_fmtp(&self, fmtp: Option<&str>) {
        self.negotiated.write().recv_fmtp = fmtp.map(str::to_string);
    }

    pub fn flags(&self) -> PayloadFlags {
        self.negotiated.read().flags
    }

    pub fn insert_flags(&self, flags: PayloadFlags) {
        self.negotiated.write().flags.insert(flags);
    }

    pub fn remove_flags(&self, flags: PayloadFlags) {
        self.negotiated.write().flags.remove(flags);
    }

    /// SDP rtpmap value: `encoding-name/clock-rate[/channels]` (RFC 4566 §6).
    ///
    /// The channel count is only written when it is greater than one.
    pub fn rtpmap(&self) -> String {
        if self.channels > 1 {
            format!("{}/{}/{}", self.mime_type, self.clock_rate, self.channels)
        } else {
            format!("{}/{}", self.mime_type, self.clock_rate)
        }
    }

    /// Same codec: MIME (case-insensitive), clock rate and channel count.
    pub fn same_codec(&self, other: &PayloadType) -> bool {
        self.mime_type.eq_ignore_ascii_case(&other.mime_type)
            && self.clock_rate == other.clock_rate
            && self.channels == other.channels
    }

    /// Media clock units elapsed over `duration`, rounded down.
    pub fn units_in(&self, duration: Duration) -> u64 {
        (duration.as_nanos() * self.clock_rate as u128 / 1_000_000_000) as u64
    }

    /// Wall time covered by `units` media clock units.
    pub fn duration_of(&self, units: u64) -> Duration {
        let nanos = units as u128 * 1_000_000_000 / self.clock_rate as u128;
        Duration::from_nanos(nanos as u64)
    }
}

impl Clone for PayloadType {
    /// Deep copy, including the negotiated attributes.
    fn clone(&self) -> Self {
        Self {
            mime_type: self.mime_type.clone(),
            clock_rate: self.clock_rate,
            channels: self.channels,
            kind: self.kind,
            bits_per_sample: self.bits_per_sample,
            normal_bitrate: self.normal_bitrate,
            negotiated: RwLock::new(self.negotiated.read().clone()),
        }
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.mime_type == other.mime_type
            && self.clock_rate == other.clock_rate
            && self.channels == other.channels
            && self.kind == other.kind
            && self.bits_per_sample == other.bits_per_sample
            && self.normal_bitrate == other.normal_bitrate
            && *self.negotiated.read() == *other.negotiated.read()
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rtpmap())
    }
}

/// Look up `param` in an fmtp string such as `"mode=20; useinbandfec=1"`.
///
/// Parameters are `;`-separated `key=value` pairs; keys compare
/// case-insensitively and surrounding whitespace is ignored.
///
/// ```
/// use rtpclock::payload::fmtp_value;
///
/// assert_eq!(fmtp_value("mode=20; useinbandfec=1", "useinbandfec"), Some("1"));
/// assert_eq!(fmtp_value("mode=20", "ptime"), None);
/// ```
pub fn fmtp_value<'a>(fmtp: &'a str, param: &str) -> Option<&'a str> {
    fmtp.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(param)
            .then(|| value.trim())
    })
}
