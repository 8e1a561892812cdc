use crate::scheduler::TickResult;
use crate::session::{MediaTick, WireEncoder};

/// Size of the RTP fixed header with no CSRCs.
pub const RTP_HEADER_LEN: usize = 12;

/// RTP fixed header writer (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Implements [`WireEncoder`], so it can sit directly behind a
/// [`SessionTimerGlue`](crate::SessionTimerGlue). Payload type and timestamp
/// come from each [`MediaTick`]; the encoder owns the sequence number and
/// SSRC. The marker bit is set on the first packet and on the first packet
/// after a payload change (RFC 3551 §4.1).
///
/// Headers are handed to `sink` together with the tick; socket I/O is the
/// sink's business.
pub struct RtpHeaderEncoder<S> {
    ssrc: u32,
    sequence: u16,
    packets: u64,
    sink: S,
}

impl<S> RtpHeaderEncoder<S>
where
    S: FnMut([u8; RTP_HEADER_LEN], &MediaTick) -> TickResult + Send,
{
    pub fn new(ssrc: u32, sink: S) -> Self {
        tracing::debug!(
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header encoder created"
        );
        Self {
            ssrc,
            sequence: rand::random::<u16>(),
            packets: 0,
            sink,
        }
    }

    /// Encoder with a random SSRC (RFC 3550 §8.1).
    pub fn with_random_ssrc(sink: S) -> Self {
        Self::new(rand::random::<u32>(), sink)
    }

    /// Start from a fixed sequence number instead of a random one.
    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Sequence number the next header will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Serialize one header and advance the sequence number.
    pub fn write(&mut self, payload_type: u8, timestamp: u32, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = 2 << 6;
        header[1] = ((marker as u8) << 7) | (payload_type & 0x7f);
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        self.packets += 1;
        header
    }
}

impl<S> WireEncoder for RtpHeaderEncoder<S>
where
    S: FnMut([u8; RTP_HEADER_LEN], &MediaTick) -> TickResult + Send,
{
    fn encode(&mut self, tick: &MediaTick) -> TickResult {
        let header = self.write(tick.payload_number, tick.rtp_timestamp, tick.payload_changed);
        (self.sink)(header, tick)
    }
}

impl<S> std::fmt::Debug for RtpHeaderEncoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpHeaderEncoder")
            .field("ssrc", &format_args!("{:#010X}", self.ssrc))
            .field("sequence", &self.sequence)
            .field("packets", &self.packets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TickError;
    use crate::profile::default_av_profile;
    use std::sync::Arc;
    use std::time::Duration;

    type Header = [u8; RTP_HEADER_LEN];

    fn discard(_: Header, _: &MediaTick) -> TickResult {
        Ok(())
    }

    fn make_encoder() -> RtpHeaderEncoder<fn(Header, &MediaTick) -> TickResult> {
        RtpHeaderEncoder::new(0xAABBCCDD, discard as fn(Header, &MediaTick) -> TickResult)
            .with_sequence(0)
    }

    fn media(payload_number: u8, rtp_timestamp: u32, payload_changed: bool) -> MediaTick {
        let payload = default_av_profile()
            .get(payload_number as usize)
            .cloned()
            .unwrap_or_else(|| Arc::new(crate::PayloadType::opus()));
        MediaTick {
            index: 1,
            nominal: Duration::from_millis(10),
            payload_number,
            payload,
            media_units: 80,
            rtp_timestamp,
            payload_changed,
        }
    }

    #[test]
    fn version_is_2() {
        let mut e = make_encoder();
        let buf = e.write(0, 0, false);
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(buf[0] & 0x3f, 0, "no padding, extension or CSRCs");
    }

    #[test]
    fn marker_and_payload_type() {
        let mut e = make_encoder();
        let buf = e.write(96, 0, false);
        assert_eq!(buf[1], 96);

        let buf = e.write(8, 0, true);
        assert_eq!(buf[1] & 0x80, 0x80);
        assert_eq!(buf[1] & 0x7f, 8);
    }

    #[test]
    fn sequence_wraps() {
        let mut e = make_encoder().with_sequence(u16::MAX);
        let buf = e.write(0, 0, false);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), u16::MAX);
        assert_eq!(e.sequence(), 0);
    }

    #[test]
    fn timestamp_and_ssrc_written() {
        let mut e = make_encoder();
        let buf = e.write(0, 0x01020304, false);
        assert_eq!(&buf[4..8], &[1, 2, 3, 4]);
        assert_eq!(u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]), 0xAABBCCDD);
    }

    #[test]
    fn encode_marks_payload_changes() {
        let headers = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = headers.clone();
        let mut e = RtpHeaderEncoder::new(1, move |h: Header, _: &MediaTick| -> TickResult {
            sink.lock().push(h);
            Ok(())
        })
        .with_sequence(10);

        e.encode(&media(0, 0, true)).unwrap();
        e.encode(&media(0, 80, false)).unwrap();
        e.encode(&media(8, 160, true)).unwrap();

        let headers = headers.lock();
        let markers: Vec<bool> = headers.iter().map(|h| h[1] & 0x80 != 0).collect();
        assert_eq!(markers, vec![true, false, true]);
        let seqs: Vec<u16> = headers.iter().map(|h| u16::from_be_bytes([h[2], h[3]])).collect();
        assert_eq!(seqs, vec![10, 11, 12]);
        assert_eq!(headers[2][1] & 0x7f, 8);
        assert_eq!(e.packets(), 3);
    }

    #[test]
    fn sink_error_is_returned() {
        let mut e = RtpHeaderEncoder::new(1, |_: Header, _: &MediaTick| -> TickResult {
            Err(TickError::fatal("closed"))
        });
        assert!(e.encode(&media(0, 0, true)).unwrap_err().is_fatal());
    }

    #[test]
    fn random_ssrc_differs() {
        let e1 = RtpHeaderEncoder::with_random_ssrc(discard);
        let e2 = RtpHeaderEncoder::with_random_ssrc(discard);
        assert_ne!(e1.ssrc(), e2.ssrc());
    }
}
