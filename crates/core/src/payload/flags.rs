use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Negotiated side attributes of a payload type.
///
/// These are set while an offer/answer exchange settles which payload types
/// a session may send or receive, and are used by
/// [`Profile::find_number_for_mime`](crate::Profile::find_number_for_mime)
/// to require or forbid an attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PayloadFlags(u32);

impl PayloadFlags {
    pub const NONE: Self = Self(0);
    /// The remote end accepts this payload type.
    pub const CAN_SEND: Self = Self(1 << 0);
    /// The local end accepts this payload type.
    pub const CAN_RECV: Self = Self(1 << 1);
    /// Variable bitrate codec.
    pub const VBR: Self = Self(1 << 2);
    /// RTCP feedback (RFC 4585) negotiated for this payload type.
    pub const RTCP_FEEDBACK: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::CAN_SEND, "CAN_SEND"),
        (Self::CAN_RECV, "CAN_RECV"),
        (Self::VBR, "VBR"),
        (Self::RTCP_FEEDBACK, "RTCP_FEEDBACK"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `self` and `other` share at least one bit.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for PayloadFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PayloadFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PayloadFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_intersects() {
        let flags = PayloadFlags::CAN_SEND | PayloadFlags::VBR;
        assert!(flags.contains(PayloadFlags::CAN_SEND));
        assert!(!flags.contains(PayloadFlags::CAN_SEND | PayloadFlags::CAN_RECV));
        assert!(flags.intersects(PayloadFlags::CAN_SEND | PayloadFlags::CAN_RECV));
        assert!(flags.contains(PayloadFlags::NONE));
    }

    #[test]
    fn insert_remove() {
        let mut flags = PayloadFlags::NONE;
        flags.insert(PayloadFlags::CAN_RECV);
        flags |= PayloadFlags::RTCP_FEEDBACK;
        assert_eq!(
            flags.bits(),
            PayloadFlags::CAN_RECV.bits() | PayloadFlags::RTCP_FEEDBACK.bits()
        );
        flags.remove(PayloadFlags::CAN_RECV);
        assert_eq!(flags, PayloadFlags::RTCP_FEEDBACK);
    }

    #[test]
    fn debug_lists_names() {
        let flags = PayloadFlags::CAN_SEND | PayloadFlags::CAN_RECV;
        assert_eq!(format!("{:?}", flags), "CAN_SEND | CAN_RECV");
        assert_eq!(format!("{:?}", PayloadFlags::NONE), "NONE");
    }
}
