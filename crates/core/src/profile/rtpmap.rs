use std::fmt;
use std::str::FromStr;

use crate::error::{RtpError, RtpmapErrorKind};
use crate::payload::PayloadType;

/// A parsed SDP rtpmap value (RFC 4566 §6).
///
/// ```text
/// a=rtpmap:<payload type> <encoding name>/<clock rate>[/<encoding parameters>]
///                         ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
/// ```
///
/// Only the value part is parsed. For audio the optional encoding parameter
/// is the channel count; when it is absent, any channel count matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rtpmap {
    pub encoding_name: String,
    pub clock_rate: u32,
    pub channels: Option<u16>,
}

impl Rtpmap {
    /// Whether `payload` carries this encoding.
    ///
    /// The encoding name compares case-insensitively (RFC 4855 §3), clock
    /// rate and channels exactly.
    pub fn matches(&self, payload: &PayloadType) -> bool {
        payload.mime_type().eq_ignore_ascii_case(&self.encoding_name)
            && payload.clock_rate() == self.clock_rate
            && self.channels.is_none_or(|c| c == payload.channels())
    }
}

impl FromStr for Rtpmap {
    type Err = RtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |kind| RtpError::InvalidRtpmap {
            input: s.to_string(),
            kind,
        };

        let mut fields = s.trim().split('/');

        let encoding_name = fields.next().unwrap_or("").trim();
        if encoding_name.is_empty() {
            return Err(invalid(RtpmapErrorKind::MissingEncodingName));
        }

        let clock_rate = match fields.next() {
            Some(rate) => rate
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|r| *r > 0)
                .ok_or_else(|| invalid(RtpmapErrorKind::InvalidClockRate))?,
            None => return Err(invalid(RtpmapErrorKind::MissingClockRate)),
        };

        let channels = match fields.next() {
            Some(ch) => Some(
                ch.trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|c| *c > 0)
                    .ok_or_else(|| invalid(RtpmapErrorKind::InvalidChannels))?,
            ),
            None => None,
        };

        if fields.next().is_some() {
            return Err(invalid(RtpmapErrorKind::TrailingFields));
        }

        Ok(Rtpmap {
            encoding_name: encoding_name.to_string(),
            clock_rate,
            channels,
        })
    }
}

impl fmt::Display for Rtpmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.encoding_name, self.clock_rate)?;
        if let Some(channels) = self.channels {
            write!(f, "/{}", channels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_without_channels() {
        let map: Rtpmap = "PCMU/8000".parse().unwrap();
        assert_eq!(map.encoding_name, "PCMU");
        assert_eq!(map.clock_rate, 8000);
        assert_eq!(map.channels, None);
    }

    #[test]
    fn parse_with_channels() {
        let map: Rtpmap = " opus/48000/2 ".parse().unwrap();
        assert_eq!(map.encoding_name, "opus");
        assert_eq!(map.channels, Some(2));
        assert_eq!(map.to_string(), "opus/48000/2");
    }

    #[test]
    fn parse_errors() {
        let kind = |s: &str| match s.parse::<Rtpmap>() {
            Err(RtpError::InvalidRtpmap { kind, .. }) => kind,
            other => panic!("expected rtpmap error for {s:?}, got {other:?}"),
        };
        assert_eq!(kind(""), RtpmapErrorKind::MissingEncodingName);
        assert_eq!(kind("/8000"), RtpmapErrorKind::MissingEncodingName);
        assert_eq!(kind("PCMU"), RtpmapErrorKind::MissingClockRate);
        assert_eq!(kind("PCMU/fast"), RtpmapErrorKind::InvalidClockRate);
        assert_eq!(kind("PCMU/0"), RtpmapErrorKind::InvalidClockRate);
        assert_eq!(kind("L16/44100/x"), RtpmapErrorKind::InvalidChannels);
        assert_eq!(kind("L16/44100/2/1"), RtpmapErrorKind::TrailingFields);
    }

    #[test]
    fn matching() {
        let pcmu = PayloadType::audio("PCMU", 8000, 1);
        assert!("pcmu/8000".parse::<Rtpmap>().unwrap().matches(&pcmu));
        assert!("PCMU/8000/1".parse::<Rtpmap>().unwrap().matches(&pcmu));
        assert!(!"PCMU/8000/2".parse::<Rtpmap>().unwrap().matches(&pcmu));
        assert!(!"PCMU/16000".parse::<Rtpmap>().unwrap().matches(&pcmu));
    }
}
