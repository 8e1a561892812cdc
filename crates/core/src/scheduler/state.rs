use std::time::Duration;

/// Drift bookkeeping for a fixed-period schedule.
///
/// Tick `k` (1-based) has the nominal time `k × period` and is due at
/// `origin + k × period` on the clock that drives the schedule. When it
/// actually fires, `drift = observed − due`, and the next sleep is
/// `period − drift`, so a late tick is followed by a shorter wait and the
/// long-run tick rate stays at `1 / period` whatever the wake-up jitter.
///
/// When a tick is late by a full period or more, the schedule is lagging.
/// Instead of replaying the missed slots as a burst, the origin is
/// re-anchored so the next tick fires immediately and the cadence resumes
/// from there. The nominal timeline is never re-anchored: tick `k` always
/// reports `k × period`.
///
/// This type does no waiting itself; [`PeriodicScheduler`](super::PeriodicScheduler)
/// drives it from its thread and tests drive it with synthetic clocks.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    period: Duration,
    origin: Duration,
    tick_index: u64,
    last_observed: Option<Duration>,
    drift_nanos: i64,
}

/// Result of one [`ScheduleState::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// 1-based index of the tick that just fired.
    pub index: u64,
    /// `index × period`, immune to jitter.
    pub nominal: Duration,
    /// Clock reading when the tick fired.
    pub observed: Duration,
    /// `observed − due`, negative if the tick fired early.
    pub drift_nanos: i64,
    /// How long to wait before the next tick.
    pub next_sleep: Duration,
    /// The tick was a full period or more late.
    pub lagging: bool,
}

impl ScheduleState {
    /// Start a schedule whose first tick is due at `origin + period`.
    pub fn new(period: Duration, origin: Duration) -> Self {
        Self {
            period,
            origin,
            tick_index: 0,
            last_observed: None,
            drift_nanos: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of ticks fired so far.
    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    /// Nominal time of the last fired tick (zero before the first).
    pub fn nominal_time(&self) -> Duration {
        self.nominal_at(self.tick_index)
    }

    /// Clock reading at which the last tick fired.
    pub fn last_observed(&self) -> Option<Duration> {
        self.last_observed
    }

    /// Drift of the last fired tick.
    pub fn drift_nanos(&self) -> i64 {
        self.drift_nanos
    }

    /// Clock reading at which the next tick is due.
    pub fn next_deadline(&self) -> Duration {
        self.origin + self.nominal_at(self.tick_index + 1)
    }

    /// Fire the next tick at clock reading `observed`.
    pub fn tick(&mut self, observed: Duration) -> TickOutcome {
        let index = self.tick_index + 1;
        let nominal = self.nominal_at(index);
        let drift = signed_nanos(observed, self.origin + nominal);
        let period_nanos = self.period.as_nanos() as i64;

        self.tick_index = index;
        self.last_observed = Some(observed);
        self.drift_nanos = drift;

        let lagging = drift >= period_nanos;
        let next_sleep = if lagging {
            // next due time becomes `observed`
            self.origin = observed.saturating_sub(nominal + self.period);
            Duration::ZERO
        } else {
            Duration::from_nanos((period_nanos - drift) as u64)
        };

        TickOutcome {
            index,
            nominal,
            observed,
            drift_nanos: drift,
            next_sleep,
            lagging,
        }
    }

    /// Re-anchor after a pause: the next tick is due at `now + period`.
    ///
    /// Tick indices and nominal times continue where they left off.
    pub fn rebase(&mut self, now: Duration) {
        self.origin = now.saturating_sub(self.nominal_time());
        self.drift_nanos = 0;
    }

    fn nominal_at(&self, index: u64) -> Duration {
        Duration::from_nanos((self.period.as_nanos() as u64).saturating_mul(index))
    }
}

/// `a − b` in signed nanoseconds.
fn signed_nanos(a: Duration, b: Duration) -> i64 {
    if a >= b {
        (a - b).as_nanos() as i64
    } else {
        -((b - a).as_nanos() as i64)
    }
}
