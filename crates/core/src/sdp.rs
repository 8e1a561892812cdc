//! SDP media descriptions for profile payloads (RFC 4566 / RFC 8866).
//!
//! Produces the media-level block an offer or answer carries for one RTP
//! stream:
//!
//! ```text
//! m=audio 5004 RTP/AVP 0 8 101                 ← media, port, payload list
//! a=rtpmap:0 PCMU/8000                         ← codec/clock rate
//! a=rtpmap:8 PCMA/8000
//! a=rtpmap:101 telephone-event/8000
//! a=fmtp:101 0-15                              ← codec parameters
//! ```
//!
//! Static payload types (< 96) strictly don't need an `a=rtpmap` line, but
//! writing one for every payload keeps receivers that ignore RFC 3551
//! defaults working.

use crate::payload::{MediaKind, PayloadType};
use crate::profile::Profile;

/// `a=rtpmap:<n> <encoding>/<clock>[/<channels>]`
pub fn rtpmap_line(number: u8, payload: &PayloadType) -> String {
    format!("a=rtpmap:{} {}", number, payload.rtpmap())
}

/// `a=fmtp:<n> <params>` when the payload has send parameters.
pub fn fmtp_line(number: u8, payload: &PayloadType) -> Option<String> {
    payload
        .send_fmtp()
        .map(|fmtp| format!("a=fmtp:{} {}", number, fmtp))
}

/// Generate the media block for `numbers` from `profile`.
///
/// Numbers with no payload type in the profile are skipped. Every line,
/// including the last, ends with CRLF.
pub fn media_description(profile: &Profile, media: MediaKind, port: u16, numbers: &[u8]) -> String {
    let present: Vec<(u8, &PayloadType)> = numbers
        .iter()
        .filter_map(|&n| profile.get(n as usize).map(|pt| (n, pt.as_ref())))
        .collect();

    let formats: Vec<String> = present.iter().map(|(n, _)| n.to_string()).collect();

    let mut sdp: Vec<String> = Vec::new();
    sdp.push(format!(
        "m={} {} RTP/AVP {}",
        media.sdp_media(),
        port,
        formats.join(" ")
    ));
    for (n, pt) in &present {
        sdp.push(rtpmap_line(*n, pt));
        if let Some(fmtp) = fmtp_line(*n, pt) {
            sdp.push(fmtp);
        }
    }

    tracing::debug!(profile = profile.name(), "SDP: {}", sdp.join("\r\n"));

    format!("{}\r\n", sdp.join("\r\n"))
}
