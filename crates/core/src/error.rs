//! Error types for the RTP clock library.

use std::fmt;

use crate::scheduler::SchedulerState;

/// Errors that can occur in the RTP clock library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Profile**: [`PayloadNumberOutOfRange`](Self::PayloadNumberOutOfRange),
///   [`EmptySlot`](Self::EmptySlot), [`SlotOccupied`](Self::SlotOccupied),
///   [`InvalidRtpmap`](Self::InvalidRtpmap).
/// - **Store**: [`ProfileNotFound`](Self::ProfileNotFound).
/// - **Scheduler**: [`InvalidPeriod`](Self::InvalidPeriod),
///   [`AlreadyRunning`](Self::AlreadyRunning),
///   [`InvalidTransition`](Self::InvalidTransition), [`Io`](Self::Io),
///   [`TickFatal`](Self::TickFatal).
///
/// Lookups that find nothing are not errors: they return `None`.
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// Payload type number outside `0..128` (RFC 3550 §5.1, 7-bit field).
    #[error("payload type number out of range: {0}")]
    PayloadNumberOutOfRange(usize),

    /// The source slot of a move holds no payload type.
    #[error("payload slot {0} is empty")]
    EmptySlot(u8),

    /// The destination slot of a move is taken and overwrite was not requested.
    #[error("payload slot {0} is already occupied")]
    SlotOccupied(u8),

    /// Failed to parse an SDP `rtpmap` token.
    #[error("invalid rtpmap {input:?}: {kind}")]
    InvalidRtpmap { input: String, kind: RtpmapErrorKind },

    /// No profile with the given name in the [`ProfileStore`](crate::ProfileStore).
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Scheduler period must be non-zero and at most one second.
    #[error("invalid scheduler period: {0:?}")]
    InvalidPeriod(std::time::Duration),

    /// [`PeriodicScheduler::start`](crate::PeriodicScheduler::start) was called while not stopped.
    #[error("scheduler already running")]
    AlreadyRunning,

    /// Requested state change is not allowed from the current state.
    #[error("invalid scheduler transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SchedulerState,
        to: SchedulerState,
    },

    /// The scheduler thread could not be spawned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A tick handler reported a fatal error and the scheduler stopped.
    #[error("scheduler stopped: {0}")]
    TickFatal(#[source] TickError),
}

/// Specific kind of rtpmap parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtpmapErrorKind {
    /// The encoding name before the first `/` was empty.
    MissingEncodingName,
    /// No `/clock-rate` part.
    MissingClockRate,
    /// Clock rate was not a positive integer.
    InvalidClockRate,
    /// Channel count was not a positive integer.
    InvalidChannels,
    /// More than three `/`-separated fields.
    TrailingFields,
}

impl fmt::Display for RtpmapErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEncodingName => write!(f, "missing encoding name"),
            Self::MissingClockRate => write!(f, "missing clock rate"),
            Self::InvalidClockRate => write!(f, "invalid clock rate"),
            Self::InvalidChannels => write!(f, "invalid channel count"),
            Self::TrailingFields => write!(f, "unexpected trailing fields"),
        }
    }
}

/// Error returned by a [`TickHandler`](crate::TickHandler) for one tick.
///
/// The scheduler logs [`Recoverable`](Self::Recoverable) errors and keeps
/// ticking. A [`Fatal`](Self::Fatal) error (e.g. the downstream transport
/// closed) stops the scheduler and is reported to its owner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    #[error("tick failed: {0}")]
    Recoverable(String),

    #[error("fatal tick failure: {0}")]
    Fatal(String),
}

impl TickError {
    pub fn recoverable(reason: impl Into<String>) -> Self {
        Self::Recoverable(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Convenience alias for `Result<T, RtpError>`.
pub type Result<T> = std::result::Result<T, RtpError>;
