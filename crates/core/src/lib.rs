pub mod clock;
pub mod error;
pub mod payload;
pub mod profile;
pub mod rtp;
pub mod scheduler;
pub mod sdp;
pub mod session;

pub use clock::{Clock, MonotonicClock};
pub use error::{Result, RtpError, TickError};
pub use payload::{MediaKind, PayloadFlags, PayloadType};
pub use profile::{PayloadQuery, Profile, ProfileStore, Rtpmap, default_av_profile};
pub use rtp::RtpHeaderEncoder;
pub use scheduler::{
    PeriodicScheduler, SchedulerConfig, SchedulerState, SchedulerStats, Tick, TickHandler,
    TickResult,
};
pub use session::{BindingHandle, MediaTick, SessionConfig, SessionTimerGlue, WireEncoder};
