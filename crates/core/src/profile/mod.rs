//! RTP profiles: payload type number → codec descriptor tables.
//!
//! A [`Profile`] is a fixed table of 128 slots. The slot index *is* the
//! payload type number carried in the RTP header (RFC 3550 §5.1), so a
//! lookup on the receive path is a single array access.
//!
//! ```text
//!  slot   0 → PCMU/8000
//!  slot   3 → GSM/8000
//!  slot   8 → PCMA/8000
//!  ...
//!  slot  96 → (dynamic, assigned by SDP negotiation)
//!  slot 127 → (empty)
//! ```
//!
//! Profiles are configured once and read many times; they do no internal
//! locking. Callers that mutate a profile shared between threads serialize
//! those mutations themselves, typically by publishing a new
//! `Arc<Profile>` (see [`ProfileStore::update`]).
//!
//! ## Sharing payload types
//!
//! Slots hold `Arc<PayloadType>`. [`Profile::clone_shallow`] copies the
//! pointers, so both profiles see the same descriptor;
//! [`Profile::clone_deep`] copies the descriptors. Dropping a profile drops
//! only its own references.

pub mod av;
pub mod rtpmap;
pub mod store;

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RtpError};
use crate::payload::{MAX_PAYLOAD_TYPES, PayloadFlags, PayloadType};

pub use av::{AV_PROFILE_NAME, build_av_profile, default_av_profile};
pub use rtpmap::Rtpmap;
pub use store::ProfileStore;

/// Criteria for [`Profile::find_number`].
///
/// The MIME subtype always matches case-insensitively. Clock rate and
/// channels are only checked when set. `require` flags must all be present
/// on the payload type, `forbid` flags must all be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadQuery<'a> {
    mime: &'a str,
    clock_rate: Option<u32>,
    channels: Option<u16>,
    require: PayloadFlags,
    forbid: PayloadFlags,
}

impl<'a> PayloadQuery<'a> {
    pub fn mime(mime: &'a str) -> Self {
        Self {
            mime,
            clock_rate: None,
            channels: None,
            require: PayloadFlags::NONE,
            forbid: PayloadFlags::NONE,
        }
    }

    pub fn clock_rate(mut self, clock_rate: u32) -> Self {
        self.clock_rate = Some(clock_rate);
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn require(mut self, flags: PayloadFlags) -> Self {
        self.require = flags;
        self
    }

    pub fn forbid(mut self, flags: PayloadFlags) -> Self {
        self.forbid = flags;
        self
    }

    pub fn matches(&self, payload: &PayloadType) -> bool {
        if !payload.mime_type().eq_ignore_ascii_case(self.mime) {
            return false;
        }
        if self.clock_rate.is_some_and(|rate| rate != payload.clock_rate()) {
            return false;
        }
        if self.channels.is_some_and(|ch| ch != payload.channels()) {
            return false;
        }
        let flags = payload.flags();
        flags.contains(self.require) && !flags.intersects(self.forbid)
    }
}

/// A named table mapping RTP payload type numbers to codec descriptors.
///
/// `Clone` is shallow: the clone shares payload type objects with the
/// original, exactly like [`clone_shallow`](Self::clone_shallow).
#[derive(Clone)]
pub struct Profile {
    name: String,
    slots: [Option<Arc<PayloadType>>; MAX_PAYLOAD_TYPES],
}

impl Profile {
    /// Create an empty profile.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Payload type at `number`.
    ///
    /// Returns `None` both for an empty slot and for a number outside
    /// `0..128`: absence is an ordinary outcome for sparse profiles.
    pub fn get(&self, number: usize) -> Option<&Arc<PayloadType>> {
        self.slots.get(number)?.as_ref()
    }

    /// Insert or replace the payload type at `number`, returning the previous one.
    ///
    /// Pass a `PayloadType` to give this profile its own descriptor, or an
    /// existing `Arc<PayloadType>` to share one.
    ///
    /// # Panics
    ///
    /// If `number` is not in `0..128`. Use [`try_set`](Self::try_set) for
    /// numbers that come from untrusted input.
    pub fn set(
        &mut self,
        number: usize,
        payload: impl Into<Arc<PayloadType>>,
    ) -> Option<Arc<PayloadType>> {
        assert!(
            number < MAX_PAYLOAD_TYPES,
            "payload type number {number} out of range 0..{MAX_PAYLOAD_TYPES}"
        );
        let payload = payload.into();
        tracing::debug!(profile = %self.name, number, payload = %payload, "payload set");
        self.slots[number].replace(payload)
    }

    /// Checked form of [`set`](Self::set).
    pub fn try_set(
        &mut self,
        number: usize,
        payload: impl Into<Arc<PayloadType>>,
    ) -> Result<Option<Arc<PayloadType>>> {
        if number >= MAX_PAYLOAD_TYPES {
            return Err(RtpError::PayloadNumberOutOfRange(number));
        }
        Ok(self.set(number, payload))
    }

    /// Empty the slot at `number`, returning what it held.
    ///
    /// # Panics
    ///
    /// If `number` is not in `0..128`.
    pub fn clear(&mut self, number: usize) -> Option<Arc<PayloadType>> {
        assert!(
            number < MAX_PAYLOAD_TYPES,
            "payload type number {number} out of range 0..{MAX_PAYLOAD_TYPES}"
        );
        let removed = self.slots[number].take();
        if removed.is_some() {
            tracing::debug!(profile = %self.name, number, "payload cleared");
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Occupied slots in ascending payload number order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Arc<PayloadType>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(n, slot)| slot.as_ref().map(|pt| (n as u8, pt)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Lowest payload number whose payload type satisfies `query`.
    pub fn find_number(&self, query: &PayloadQuery<'_>) -> Option<u8> {
        self.iter()
            .find(|(_, pt)| query.matches(pt))
            .map(|(n, _)| n)
    }

    /// First payload type whose MIME subtype matches, case-insensitively.
    pub fn find_by_mime(&self, mime: &str) -> Option<(u8, &Arc<PayloadType>)> {
        self.iter()
            .find(|(_, pt)| pt.mime_type().eq_ignore_ascii_case(mime))
    }

    /// Payload number for an SDP rtpmap value such as `"opus/48000/2"`.
    ///
    /// A malformed value finds nothing, like an unknown codec.
    ///
    /// ```
    /// use rtpclock::default_av_profile;
    ///
    /// let av = default_av_profile();
    /// assert_eq!(av.find_by_rtpmap("PCMU/8000"), Some(0));
    /// assert_eq!(av.find_by_rtpmap("nonexistent/1"), None);
    /// ```
    pub fn find_by_rtpmap(&self, rtpmap: &str) -> Option<u8> {
        let map: Rtpmap = match rtpmap.parse() {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!(error = %e, "unparsable rtpmap");
                return None;
            }
        };
        let mut query = PayloadQuery::mime(&map.encoding_name).clock_rate(map.clock_rate);
        if let Some(channels) = map.channels {
            query = query.channels(channels);
        }
        self.find_number(&query)
    }

    /// Payload number for `mime` whose flags include all of `require` and
    /// none of `forbid`.
    pub fn find_number_for_mime(
        &self,
        mime: &str,
        require: PayloadFlags,
        forbid: PayloadFlags,
    ) -> Option<u8> {
        self.find_number(&PayloadQuery::mime(mime).require(require).forbid(forbid))
    }

    /// Relocate the payload type at `from` to `to`.
    ///
    /// Fails without touching the profile if `from` is empty, or if `to` is
    /// occupied and `overwrite` is false.
    pub fn move_payload(&mut self, from: usize, to: usize, overwrite: bool) -> Result<()> {
        for n in [from, to] {
            if n >= MAX_PAYLOAD_TYPES {
                return Err(RtpError::PayloadNumberOutOfRange(n));
            }
        }
        if self.slots[from].is_none() {
            return Err(RtpError::EmptySlot(from as u8));
        }
        if from == to {
            return Ok(());
        }
        if self.slots[to].is_some() && !overwrite {
            return Err(RtpError::SlotOccupied(to as u8));
        }
        let payload = self.slots[from].take();
        self.slots[to] = payload;
        tracing::debug!(profile = %self.name, from, to, "payload moved");
        Ok(())
    }

    /// Exchange the contents of two slots (either may be empty).
    ///
    /// # Panics
    ///
    /// If either number is not in `0..128`.
    pub fn swap_payloads(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
    }

    /// Copy of this profile that shares every payload type object.
    pub fn clone_shallow(&self) -> Profile {
        self.clone()
    }

    /// Copy of this profile with its own copy of every payload type.
    pub fn clone_deep(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            slots: std::array::from_fn(|n| {
                self.slots[n]
                    .as_ref()
                    .map(|pt| Arc::new(PayloadType::clone(pt)))
            }),
        }
    }

    /// Whether slot `number` of both profiles holds the very same object.
    pub fn shares_payload_with(&self, other: &Profile, number: usize) -> bool {
        match (self.get(number), other.get(number)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether `number` maps to an RFC 4733 telephone-event payload.
    pub fn is_telephone_event(&self, number: usize) -> bool {
        self.get(number).is_some_and(|pt| pt.is_telephone_event())
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field(
                "payloads",
                &self
                    .iter()
                    .map(|(n, pt)| (n, pt.rtpmap()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Profile {
        let mut p = Profile::new("test");
        p.set(0, PayloadType::audio("PCMU", 8000, 1));
        p.set(8, PayloadType::audio("PCMA", 8000, 1));
        p.set(96, PayloadType::opus());
        p.set(101, PayloadType::telephone_event());
        p
    }

    #[test]
    fn set_then_get_every_slot() {
        let mut p = Profile::new("all");
        for n in 0..MAX_PAYLOAD_TYPES {
            let pt = Arc::new(PayloadType::audio("L16", 8000 + n as u32, 1));
            p.set(n, pt.clone());
            assert!(Arc::ptr_eq(p.get(n).unwrap(), &pt));
        }
        assert_eq!(p.len(), MAX_PAYLOAD_TYPES);
    }

    #[test]
    fn get_out_of_range_is_absent() {
        let p = sample();
        assert!(p.get(128).is_none());
        assert!(p.get(usize::MAX).is_none());
        assert!(p.get(1).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_out_of_range_panics() {
        let mut p = Profile::new("bad");
        p.set(128, PayloadType::vp8());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn clear_out_of_range_panics() {
        let mut p = Profile::new("bad");
        p.clear(200);
    }

    #[test]
    fn try_set_out_of_range_is_error() {
        let mut p = Profile::new("bad");
        assert!(matches!(
            p.try_set(128, PayloadType::vp8()),
            Err(RtpError::PayloadNumberOutOfRange(128))
        ));
        assert!(p.is_empty());
    }

    #[test]
    fn set_returns_previous_and_clear_empties() {
        let mut p = sample();
        let old = p.set(0, PayloadType::audio("G722", 8000, 1)).unwrap();
        assert_eq!(old.mime_type(), "PCMU");
        assert_eq!(p.clear(0).unwrap().mime_type(), "G722");
        assert!(p.get(0).is_none());
        assert!(p.clear(0).is_none());
    }

    #[test]
    fn find_by_mime_is_case_insensitive() {
        let p = sample();
        let (n, pt) = p.find_by_mime("pcma").unwrap();
        assert_eq!(n, 8);
        assert_eq!(pt.mime_type(), "PCMA");
        assert!(p.find_by_mime("G729").is_none());
    }

    #[test]
    fn find_by_rtpmap_checks_rate_and_channels() {
        let p = sample();
        assert_eq!(p.find_by_rtpmap("PCMU/8000"), Some(0));
        assert_eq!(p.find_by_rtpmap("OPUS/48000/2"), Some(96));
        assert_eq!(p.find_by_rtpmap("opus/48000"), Some(96));
        assert_eq!(p.find_by_rtpmap("opus/48000/1"), None);
        assert_eq!(p.find_by_rtpmap("PCMU/16000"), None);
        assert_eq!(p.find_by_rtpmap("nonexistent/1"), None);
        assert_eq!(p.find_by_rtpmap("garbage"), None);
    }

    #[test]
    fn find_number_for_mime_with_flags() {
        let mut p = sample();
        p.set(97, PayloadType::opus());
        p.get(97).unwrap().insert_flags(PayloadFlags::CAN_SEND);

        assert_eq!(
            p.find_number_for_mime("opus", PayloadFlags::NONE, PayloadFlags::NONE),
            Some(96)
        );
        assert_eq!(
            p.find_number_for_mime("opus", PayloadFlags::CAN_SEND, PayloadFlags::NONE),
            Some(97)
        );
        assert_eq!(
            p.find_number_for_mime("opus", PayloadFlags::NONE, PayloadFlags::CAN_SEND),
            Some(96)
        );
        assert_eq!(
            p.find_number_for_mime("opus", PayloadFlags::CAN_RECV, PayloadFlags::NONE),
            None
        );
    }

    #[test]
    fn move_payload_respects_occupied_destination() {
        let mut p = sample();
        assert!(matches!(
            p.move_payload(96, 0, false),
            Err(RtpError::SlotOccupied(0))
        ));
        assert_eq!(p.get(96).unwrap().mime_type(), "opus");
        assert_eq!(p.get(0).unwrap().mime_type(), "PCMU");

        p.move_payload(96, 111, false).unwrap();
        assert!(p.get(96).is_none());
        assert_eq!(p.get(111).unwrap().mime_type(), "opus");

        p.move_payload(111, 0, true).unwrap();
        assert_eq!(p.get(0).unwrap().mime_type(), "opus");
    }

    #[test]
    fn move_payload_errors() {
        let mut p = sample();
        assert!(matches!(
            p.move_payload(50, 51, false),
            Err(RtpError::EmptySlot(50))
        ));
        assert!(matches!(
            p.move_payload(0, 128, true),
            Err(RtpError::PayloadNumberOutOfRange(128))
        ));
        p.move_payload(0, 0, false).unwrap();
        assert_eq!(p.get(0).unwrap().mime_type(), "PCMU");
    }

    #[test]
    fn swap() {
        let mut p = sample();
        p.swap_payloads(0, 1);
        assert!(p.get(0).is_none());
        assert_eq!(p.get(1).unwrap().mime_type(), "PCMU");
    }

    #[test]
    fn shallow_clone_shares_payloads() {
        let p = sample();
        let shallow = p.clone_shallow();
        for n in 0..MAX_PAYLOAD_TYPES {
            assert_eq!(p.get(n), shallow.get(n));
        }
        assert!(p.shares_payload_with(&shallow, 96));

        shallow
            .get(96)
            .unwrap()
            .set_send_fmtp(Some("useinbandfec=1"));
        assert_eq!(
            p.get(96).unwrap().send_fmtp().as_deref(),
            Some("useinbandfec=1")
        );
    }

    #[test]
    fn deep_clone_copies_payloads() {
        let p = sample();
        let deep = p.clone_deep();
        for n in 0..MAX_PAYLOAD_TYPES {
            assert_eq!(p.get(n), deep.get(n));
        }
        assert!(!p.shares_payload_with(&deep, 96));

        deep.get(96).unwrap().set_send_fmtp(Some("stereo=1"));
        assert_eq!(p.get(96).unwrap().send_fmtp(), None);
    }

    #[test]
    fn slot_mutation_does_not_leak_between_clones() {
        let p = sample();
        let mut shallow = p.clone_shallow();
        shallow.clear(0);
        assert!(p.get(0).is_some());
    }

    #[test]
    fn telephone_event_slot() {
        let p = sample();
        assert!(p.is_telephone_event(101));
        assert!(!p.is_telephone_event(0));
        assert!(!p.is_telephone_event(5));
    }

    #[test]
    fn iter_in_number_order() {
        let p = sample();
        let numbers: Vec<u8> = p.iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![0, 8, 96, 101]);
    }
}
