//! The RFC 3551 audio/video profile ("RTP/AVP").
//!
//! | PT | Encoding | Media | Clock (Hz) | Channels |
//! |----|----------|-------|-----------:|---------:|
//! | 0  | PCMU     | A     | 8000       | 1 |
//! | 3  | GSM      | A     | 8000       | 1 |
//! | 4  | G723     | A     | 8000       | 1 |
//! | 5  | DVI4     | A     | 8000       | 1 |
//! | 6  | DVI4     | A     | 16000      | 1 |
//! | 7  | LPC      | A     | 8000       | 1 |
//! | 8  | PCMA     | A     | 8000       | 1 |
//! | 9  | G722     | A     | 8000       | 1 |
//! | 10 | L16      | A     | 44100      | 2 |
//! | 11 | L16      | A     | 44100      | 1 |
//! | 12 | QCELP    | A     | 8000       | 1 |
//! | 13 | CN       | A     | 8000       | 1 |
//! | 14 | MPA      | A     | 90000      | 1 |
//! | 15 | G728     | A     | 8000       | 1 |
//! | 16 | DVI4     | A     | 11025      | 1 |
//! | 17 | DVI4     | A     | 22050      | 1 |
//! | 18 | G729     | A     | 8000       | 1 |
//! | 25 | CelB     | V     | 90000      |   |
//! | 26 | JPEG     | V     | 90000      |   |
//! | 28 | nv       | V     | 90000      |   |
//! | 31 | H261     | V     | 90000      |   |
//! | 32 | MPV      | V     | 90000      |   |
//! | 33 | MP2T     | AV    | 90000      |   |
//! | 34 | H263     | V     | 90000      |   |
//!
//! G722 is listed at 8000 Hz even though it samples at 16 kHz: RFC 3551
//! §4.5.2 keeps the RTP clock at 8000 for historical reasons.

use std::sync::{Arc, OnceLock};

use super::Profile;
use crate::payload::{MediaKind, PayloadType};

pub const AV_PROFILE_NAME: &str = "AV profile";

static AV_PROFILE: OnceLock<Arc<Profile>> = OnceLock::new();

/// Shared, read-only RFC 3551 profile.
///
/// Built on first use and shared by every caller afterwards. Sessions
/// that need to change it take their own copy with
/// [`Profile::clone_shallow`] or [`Profile::clone_deep`].
pub fn default_av_profile() -> Arc<Profile> {
    AV_PROFILE
        .get_or_init(|| {
            tracing::debug!("building default AV profile");
            Arc::new(build_av_profile())
        })
        .clone()
}

/// Build a fresh, unshared RFC 3551 profile.
pub fn build_av_profile() -> Profile {
    let mut p = Profile::new(AV_PROFILE_NAME);

    let audio = |mime: &str, rate: u32, bits: u16, bitrate: u32| {
        PayloadType::audio(mime, rate, 1)
            .with_bits_per_sample(bits)
            .with_bitrate(bitrate)
    };

    p.set(0, audio("PCMU", 8000, 8, 64000));
    p.set(3, audio("GSM", 8000, 0, 13200));
    p.set(4, audio("G723", 8000, 0, 6300));
    p.set(5, audio("DVI4", 8000, 4, 32000));
    p.set(6, audio("DVI4", 16000, 4, 64000));
    p.set(7, audio("LPC", 8000, 0, 2400));
    p.set(8, audio("PCMA", 8000, 8, 64000));
    p.set(9, audio("G722", 8000, 8, 64000));
    p.set(
        10,
        PayloadType::audio("L16", 44100, 2)
            .with_bits_per_sample(16)
            .with_bitrate(1_411_200),
    );
    p.set(11, audio("L16", 44100, 16, 705_600));
    p.set(12, audio("QCELP", 8000, 0, 0));
    p.set(13, audio("CN", 8000, 0, 0));
    p.set(14, PayloadType::audio("MPA", 90000, 1));
    p.set(15, audio("G728", 8000, 0, 16000));
    p.set(16, audio("DVI4", 11025, 4, 44100));
    p.set(17, audio("DVI4", 22050, 4, 88200));
    p.set(18, audio("G729", 8000, 0, 8000));

    for (n, mime) in [
        (25, "CelB"),
        (26, "JPEG"),
        (28, "nv"),
        (31, "H261"),
        (32, "MPV"),
        (34, "H263"),
    ] {
        p.set(n, PayloadType::video(mime, 90000));
    }
    p.set(33, PayloadType::new(MediaKind::Other, "MP2T", 90000, 1));

    p
}
