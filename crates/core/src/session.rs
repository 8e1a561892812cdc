//! Binds a session's negotiated payload type to the scheduler tick.
//!
//! [`SessionTimerGlue`] is the [`TickHandler`] a sending session hands to its
//! [`PeriodicScheduler`](crate::PeriodicScheduler). On every tick it looks up
//! the payload type currently negotiated for the session, turns the tick's
//! nominal time into an RTP timestamp in that payload's media clock, and
//! passes the result to a [`WireEncoder`].
//!
//! ```text
//! tick(nominal) ─▶ binding.profile[payload_number] ─▶ rtp_ts ─▶ encoder
//! ```
//!
//! The RTP timestamp is derived from the nominal time, never from the wall
//! clock, so it advances by exactly `period × clock_rate` per tick on
//! average even when that product is fractional (22.05 kHz at 10 ms yields
//! 220 and 221 units in turn).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, RtpError, TickError};
use crate::payload::{MAX_PAYLOAD_TYPES, PayloadType};
use crate::profile::{Profile, ProfileStore};
use crate::scheduler::{Tick, TickHandler, TickResult};

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Negotiated payload number, `[0, 128)`.
    pub payload_number: u8,
    /// RTP timestamp of the first packet. Random when `None` (RFC 3550 §5.1).
    pub initial_timestamp: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            payload_number: 0,
            initial_timestamp: None,
        }
    }
}

impl SessionConfig {
    pub fn with_payload(payload_number: u8) -> Self {
        Self {
            payload_number,
            ..Self::default()
        }
    }
}

/// What the wire encoder receives for one tick.
#[derive(Debug, Clone)]
pub struct MediaTick {
    pub index: u64,
    /// Nominal scheduler time of the tick.
    pub nominal: Duration,
    pub payload_number: u8,
    pub payload: Arc<PayloadType>,
    /// Media clock units since the previous tick.
    pub media_units: u32,
    pub rtp_timestamp: u32,
    /// First tick of the session, or the payload type differs from the
    /// previous tick's.
    pub payload_changed: bool,
}

/// Packetization stage fed by [`SessionTimerGlue`].
///
/// Return [`TickError::Fatal`] when the transport is gone for good; anything
/// else should be [`TickError::Recoverable`].
pub trait WireEncoder: Send {
    fn encode(&mut self, tick: &MediaTick) -> TickResult;
}

impl<F> WireEncoder for F
where
    F: FnMut(&MediaTick) -> TickResult + Send,
{
    fn encode(&mut self, tick: &MediaTick) -> TickResult {
        self(tick)
    }
}

struct Binding {
    profile: Arc<Profile>,
    payload_number: u8,
}

struct SessionShared {
    binding: RwLock<Binding>,
    last_timestamp: Mutex<Option<u32>>,
}

/// Shared handle to a session's profile binding.
///
/// Stays usable after the glue has been moved into a running scheduler, so
/// the session can renegotiate while ticks are flowing. Changes take effect
/// on the next tick.
#[derive(Clone)]
pub struct BindingHandle {
    shared: Arc<SessionShared>,
}

impl BindingHandle {
    pub fn profile(&self) -> Arc<Profile> {
        self.shared.binding.read().profile.clone()
    }

    pub fn payload_number(&self) -> u8 {
        self.shared.binding.read().payload_number
    }

    /// Replace the profile, keeping the payload number.
    pub fn set_profile(&self, profile: Arc<Profile>) {
        let mut binding = self.shared.binding.write();
        tracing::debug!(
            from = binding.profile.name(),
            to = profile.name(),
            "session profile changed"
        );
        binding.profile = profile;
    }

    pub fn set_payload_number(&self, number: u8) -> Result<()> {
        check_number(number)?;
        self.shared.binding.write().payload_number = number;
        Ok(())
    }

    /// Last RTP timestamp handed to the encoder.
    pub fn current_timestamp(&self) -> Option<u32> {
        *self.shared.last_timestamp.lock()
    }
}

impl std::fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let binding = self.shared.binding.read();
        f.debug_struct("BindingHandle")
            .field("profile", &binding.profile.name())
            .field("payload_number", &binding.payload_number)
            .finish()
    }
}

/// Timestamp reference: `timestamp` was the RTP time at `nominal`.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    nominal: Duration,
    timestamp: u32,
    clock_rate: u32,
}

impl Anchor {
    fn timestamp_at(&self, nominal: Duration) -> u32 {
        let elapsed = nominal.saturating_sub(self.nominal);
        let units = elapsed.as_nanos() * self.clock_rate as u128 / 1_000_000_000;
        self.timestamp.wrapping_add(units as u32)
    }
}

struct LastTick {
    payload_number: u8,
    payload: Arc<PayloadType>,
    nominal: Duration,
    timestamp: u32,
}

/// [`TickHandler`] that timestamps ticks for a session and feeds an encoder.
pub struct SessionTimerGlue<E> {
    shared: Arc<SessionShared>,
    encoder: E,
    initial_timestamp: u32,
    anchor: Option<Anchor>,
    last: Option<LastTick>,
}

impl<E: WireEncoder> SessionTimerGlue<E> {
    pub fn new(profile: Arc<Profile>, config: SessionConfig, encoder: E) -> Result<Self> {
        check_number(config.payload_number)?;
        let initial_timestamp = config
            .initial_timestamp
            .unwrap_or_else(rand::random::<u32>);

        tracing::debug!(
            profile = profile.name(),
            payload = config.payload_number,
            initial_timestamp,
            "session timer bound"
        );

        Ok(Self {
            shared: Arc::new(SessionShared {
                binding: RwLock::new(Binding {
                    profile,
                    payload_number: config.payload_number,
                }),
                last_timestamp: Mutex::new(None),
            }),
            encoder,
            initial_timestamp,
            anchor: None,
            last: None,
        })
    }

    /// Bind to the profile registered under `profile_name` in `store`.
    pub fn from_store(
        store: &ProfileStore,
        profile_name: &str,
        config: SessionConfig,
        encoder: E,
    ) -> Result<Self> {
        let profile = store
            .get(profile_name)
            .ok_or_else(|| RtpError::ProfileNotFound(profile_name.to_string()))?;
        Self::new(profile, config, encoder)
    }

    pub fn binding(&self) -> BindingHandle {
        BindingHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn current_timestamp(&self) -> Option<u32> {
        self.last.as_ref().map(|last| last.timestamp)
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    fn lookup(&self) -> std::result::Result<(u8, Arc<PayloadType>), TickError> {
        let binding = self.shared.binding.read();
        let number = binding.payload_number;
        match binding.profile.get(number as usize) {
            Some(payload) => Ok((number, payload.clone())),
            None => Err(TickError::recoverable(format!(
                "no payload type {} in profile {:?}",
                number,
                binding.profile.name()
            ))),
        }
    }

    fn timestamp_for(&mut self, tick: &Tick, payload: &PayloadType) -> u32 {
        let clock_rate = payload.clock_rate();
        let anchor = match (self.anchor, &self.last) {
            (Some(anchor), _) if anchor.clock_rate == clock_rate => anchor,
            (_, Some(last)) => {
                tracing::debug!(
                    clock_rate,
                    timestamp = last.timestamp,
                    "media clock rate changed, re-anchoring RTP timestamp"
                );
                Anchor {
                    nominal: last.nominal,
                    timestamp: last.timestamp,
                    clock_rate,
                }
            }
            (_, None) => Anchor {
                nominal: tick.nominal,
                timestamp: self.initial_timestamp,
                clock_rate,
            },
        };
        self.anchor = Some(anchor);
        anchor.timestamp_at(tick.nominal)
    }
}

impl<E: WireEncoder> TickHandler for SessionTimerGlue<E> {
    fn on_tick(&mut self, tick: &Tick) -> TickResult {
        let (number, payload) = self.lookup()?;

        let payload_changed = match &self.last {
            None => true,
            Some(last) => last.payload_number != number || !Arc::ptr_eq(&last.payload, &payload),
        };
        if payload_changed && let Some(last) = &self.last {
            tracing::debug!(
                from = last.payload_number,
                to = number,
                rtpmap = %payload.rtpmap(),
                "payload type changed"
            );
        }

        let rtp_timestamp = self.timestamp_for(tick, &payload);
        let media_units = match &self.last {
            Some(last) => rtp_timestamp.wrapping_sub(last.timestamp),
            None => payload.units_in(tick.period) as u32,
        };

        let media = MediaTick {
            index: tick.index,
            nominal: tick.nominal,
            payload_number: number,
            payload: payload.clone(),
            media_units,
            rtp_timestamp,
            payload_changed,
        };

        self.last = Some(LastTick {
            payload_number: number,
            payload,
            nominal: tick.nominal,
            timestamp: rtp_timestamp,
        });
        *self.shared.last_timestamp.lock() = Some(rtp_timestamp);

        self.encoder.encode(&media)
    }
}

fn check_number(number: u8) -> Result<()> {
    if number as usize >= MAX_PAYLOAD_TYPES {
        return Err(RtpError::PayloadNumberOutOfRange(number as usize));
    }
    Ok(())
}
