//! Fixed-period tick scheduler with drift correction.
//!
//! A [`PeriodicScheduler`] owns one dedicated thread that sleeps until the
//! next nominal deadline, calls a [`TickHandler`], and repeats. Deadline
//! bookkeeping lives in [`ScheduleState`]; this module adds the thread, the
//! state machine and error handling around it.
//!
//! ## State machine
//!
//! ```text
//! start()            Stopped -> Running
//! pause()            Running -> Paused
//! resume()           Paused  -> Running
//! stop()             any     -> Stopped   (no-op when already stopped)
//! fatal tick error   Running -> Stopped
//! tick limit reached Running -> Stopped
//! ```
//!
//! The state check that admits a tick and the start of its handler call
//! happen under one lock. Once `pause()` or `stop()` returns, no further
//! handler call begins; a call already in progress is waited for.
//!
//! ## Handler contract
//!
//! The handler runs on the scheduler thread and receives the *nominal*
//! tick time, so timestamps derived from it are evenly spaced even when the
//! thread wakes late. It should return well within one period; a slow
//! handler is itself a source of drift.
//!
//! A [`TickError::Recoverable`] is logged and the next tick runs as usual.
//! A [`TickError::Fatal`] stops the scheduler; the owner retrieves it with
//! [`PeriodicScheduler::take_error`].

mod state;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Result, RtpError, TickError};

pub use state::{ScheduleState, TickOutcome};

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// Longest accepted tick period.
pub const MAX_PERIOD: Duration = Duration::from_secs(1);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between ticks, in `(0, 1s]`.
    pub period: Duration,
    /// Name of the scheduler thread.
    pub thread_name: String,
    /// Stop by itself after this many ticks.
    pub tick_limit: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            thread_name: "rtp-scheduler".to_string(),
            tick_limit: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    pub fn with_tick_limit(mut self, ticks: u64) -> Self {
        self.tick_limit = Some(ticks);
        self
    }
}

/// Lifecycle state of a [`PeriodicScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

/// What a [`TickHandler`] is told on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick number since [`PeriodicScheduler::start`].
    pub index: u64,
    /// `index × period`. Use this, not the wall clock, for media timestamps.
    pub nominal: Duration,
    pub period: Duration,
    /// How late the tick fired, in nanoseconds (diagnostic only).
    pub drift_nanos: i64,
    /// The tick was a full period or more late.
    pub lagging: bool,
}

/// Outcome of one handler call.
pub type TickResult = std::result::Result<(), TickError>;

/// Per-tick callback run on the scheduler thread.
pub trait TickHandler: Send {
    fn on_tick(&mut self, tick: &Tick) -> TickResult;
}

impl<F> TickHandler for F
where
    F: FnMut(&Tick) -> TickResult + Send,
{
    fn on_tick(&mut self, tick: &Tick) -> TickResult {
        self(tick)
    }
}

/// Counters since the last [`PeriodicScheduler::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub lagging_ticks: u64,
    /// Ticks whose handler returned an error.
    pub failed_ticks: u64,
    /// Largest positive drift seen.
    pub max_drift: Duration,
}

struct Control {
    state: SchedulerState,
    /// Bumped on every resume so the thread knows to re-anchor.
    resumes: u64,
    /// A handler call is in progress.
    in_tick: bool,
    stats: SchedulerStats,
    error: Option<TickError>,
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
}

impl Shared {
    fn set_state(&self, state: SchedulerState) {
        self.control.lock().state = state;
        self.wake.notify_all();
    }
}

/// Runs a [`TickHandler`] every `period` on a dedicated thread.
///
/// ```no_run
/// use std::time::Duration;
/// use rtpclock::{PeriodicScheduler, SchedulerConfig, Tick, TickResult};
///
/// let mut scheduler = PeriodicScheduler::new(SchedulerConfig::with_period(Duration::from_millis(20)));
/// scheduler
///     .start(|tick: &Tick| -> TickResult {
///         println!("tick {} at {:?}", tick.index, tick.nominal);
///         Ok(())
///     })
///     .unwrap();
/// std::thread::sleep(Duration::from_millis(100));
/// scheduler.stop();
/// ```
pub struct PeriodicScheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicScheduler {
    /// Scheduler driven by the OS monotonic clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Scheduler driven by a custom clock source.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    state: SchedulerState::Stopped,
                    resumes: 0,
                    in_tick: false,
                    stats: SchedulerStats::default(),
                    error: None,
                }),
                wake: Condvar::new(),
            }),
            thread: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start ticking. The first tick is due one period from now.
    pub fn start<H>(&mut self, handler: H) -> Result<()>
    where
        H: TickHandler + 'static,
    {
        let period = self.config.period;
        if period.is_zero() || period > MAX_PERIOD {
            return Err(RtpError::InvalidPeriod(period));
        }

        {
            let mut control = self.shared.control.lock();
            if control.state != SchedulerState::Stopped {
                return Err(RtpError::AlreadyRunning);
            }
            control.state = SchedulerState::Running;
            control.resumes = 0;
            control.stats = SchedulerStats::default();
            control.error = None;
        }

        // A thread that stopped itself after a fatal error is already done.
        if let Some(finished) = self.thread.take() {
            let _ = finished.join();
        }

        let shared = self.shared.clone();
        let clock = self.clock.clone();
        let origin = clock.now();
        let limit = self.config.tick_limit;
        let handler: Box<dyn TickHandler> = Box::new(handler);

        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                tick_loop(shared, clock, ScheduleState::new(period, origin), limit, handler)
            });

        match spawned {
            Ok(thread) => {
                self.thread = Some(thread);
                tracing::info!(period_ms = period.as_secs_f64() * 1e3, "scheduler started");
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(SchedulerState::Stopped);
                Err(RtpError::Io(e))
            }
        }
    }

    /// Suspend ticking. The nominal timeline resumes where it left off.
    ///
    /// Returns once any handler call in progress has finished, unless called
    /// from the handler itself.
    pub fn pause(&self) -> Result<()> {
        self.transition(SchedulerState::Running, SchedulerState::Paused)?;
        if !self.on_scheduler_thread() {
            let mut control = self.shared.control.lock();
            self.shared.wake.wait_while(&mut control, |c| c.in_tick);
        }
        tracing::info!("scheduler paused");
        Ok(())
    }

    /// Resume ticking; the next tick is due one period from now.
    pub fn resume(&self) -> Result<()> {
        self.transition(SchedulerState::Paused, SchedulerState::Running)?;
        tracing::info!("scheduler resumed");
        Ok(())
    }

    /// Stop ticking and wait for the thread to exit.
    ///
    /// A handler call already in progress finishes; no new one starts.
    /// Calling this on a stopped scheduler does nothing.
    pub fn stop(&mut self) {
        let was = {
            let mut control = self.shared.control.lock();
            std::mem::replace(&mut control.state, SchedulerState::Stopped)
        };
        self.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("scheduler thread panicked");
            }
        }
        if was != SchedulerState::Stopped {
            tracing::info!("scheduler stopped");
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.control.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.control.lock().stats
    }

    /// The fatal handler error that stopped the scheduler, if any.
    pub fn take_error(&self) -> Option<RtpError> {
        self.shared
            .control
            .lock()
            .error
            .take()
            .map(RtpError::TickFatal)
    }

    /// Block until the scheduler is stopped or `timeout` elapses.
    ///
    /// Returns `true` if the scheduler is stopped.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let mut control = self.shared.control.lock();
        self.shared.wake.wait_while_for(
            &mut control,
            |c| c.state != SchedulerState::Stopped,
            timeout,
        );
        control.state == SchedulerState::Stopped
    }

    fn on_scheduler_thread(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id())
    }

    fn transition(&self, from: SchedulerState, to: SchedulerState) -> Result<()> {
        {
            let mut control = self.shared.control.lock();
            if control.state != from {
                return Err(RtpError::InvalidTransition {
                    from: control.state,
                    to,
                });
            }
            control.state = to;
            if to == SchedulerState::Running {
                control.resumes += 1;
            }
        }
        self.shared.wake.notify_all();
        Ok(())
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_loop(
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    mut schedule: ScheduleState,
    limit: Option<u64>,
    mut handler: Box<dyn TickHandler>,
) {
    let period = schedule.period();
    let mut seen_resumes = 0;

    loop {
        // Sleep until the next deadline, or until stopped. The tick is
        // admitted under the same lock that pause() and stop() take.
        let outcome = {
            let mut control = shared.control.lock();
            let observed = loop {
                match control.state {
                    SchedulerState::Stopped => {
                        tracing::debug!(ticks = schedule.tick_index(), "tick loop exited");
                        return;
                    }
                    SchedulerState::Paused => {
                        shared.wake.wait(&mut control);
                    }
                    SchedulerState::Running => {
                        if limit.is_some_and(|n| schedule.tick_index() >= n) {
                            tracing::info!(ticks = schedule.tick_index(), "tick limit reached");
                            control.state = SchedulerState::Stopped;
                            drop(control);
                            shared.wake.notify_all();
                            return;
                        }
                        if control.resumes != seen_resumes {
                            seen_resumes = control.resumes;
                            schedule.rebase(clock.now());
                        }
                        let now = clock.now();
                        let deadline = schedule.next_deadline();
                        if now >= deadline {
                            break now;
                        }
                        shared.wake.wait_for(&mut control, deadline - now);
                    }
                }
            };
            control.in_tick = true;
            schedule.tick(observed)
        };
        if outcome.lagging {
            tracing::warn!(
                tick = outcome.index,
                drift_ms = outcome.drift_nanos as f64 / 1e6,
                "scheduler lagging, skipping missed slots"
            );
        } else {
            tracing::trace!(
                tick = outcome.index,
                nominal_ms = outcome.nominal.as_millis() as u64,
                drift_us = outcome.drift_nanos / 1000,
                "tick"
            );
        }

        let tick = Tick {
            index: outcome.index,
            nominal: outcome.nominal,
            period,
            drift_nanos: outcome.drift_nanos,
            lagging: outcome.lagging,
        };
        let result = handler.on_tick(&tick);

        let mut control = shared.control.lock();
        control.in_tick = false;
        let stats = &mut control.stats;
        stats.ticks += 1;
        if outcome.lagging {
            stats.lagging_ticks += 1;
        }
        if outcome.drift_nanos > 0 {
            stats.max_drift = stats
                .max_drift
                .max(Duration::from_nanos(outcome.drift_nanos as u64));
        }

        match result {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                stats.failed_ticks += 1;
                tracing::error!(tick = tick.index, error = %e, "tick handler failed fatally, stopping");
                control.state = SchedulerState::Stopped;
                control.error = Some(e);
                drop(control);
                shared.wake.notify_all();
                return;
            }
            Err(e) => {
                stats.failed_ticks += 1;
                tracing::warn!(tick = tick.index, error = %e, "tick handler failed");
            }
        }
        drop(control);
        shared.wake.notify_all();
    }
}
