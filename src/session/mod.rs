//! Gesture sessions: the frame loop and the handle the host holds on to.
//!
//! A [`Session`] collects callbacks, then [`Session::start`] moves them onto a
//! frame loop thread together with a [`FrameSource`]. The loop is the only
//! owner of the hold state. Callbacks can no longer be registered once the
//! session has started.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::commands::{Command, CommandTables};
use crate::config;
use crate::dispatch::{ActionError, CallbackRegistry, DispatchOutcome, Dispatcher};
use crate::gesture::{self, DetectedHand};
use crate::hold::{HoldPhase, HoldTracker, Trigger, DEFAULT_HOLD_DURATION};
use crate::listener::{FrameSource, SourceEvent};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("hold duration must be a positive number of seconds, got {0}")]
    InvalidHoldDuration(f64),
    #[error("session has already been started")]
    AlreadyStarted,
    #[error("unable to start frame loop: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time a gesture must be held before it triggers.
    pub hold_duration: Duration,
    /// Frames between progress log lines. 0 disables them.
    pub status_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            hold_duration: DEFAULT_HOLD_DURATION,
            status_interval: 100,
        }
    }
}

impl SessionConfig {
    pub fn with_hold_secs(hold_secs: f64) -> Result<SessionConfig, SessionError> {
        let hold_duration = match Duration::try_from_secs_f64(hold_secs) {
            Ok(duration) if duration > Duration::from_secs(0) => duration,
            _ => return Err(SessionError::InvalidHoldDuration(hold_secs)),
        };
        Ok(SessionConfig {
            hold_duration,
            ..SessionConfig::default()
        })
    }

    pub fn from_config(session: &config::Session) -> Result<SessionConfig, SessionError> {
        Ok(SessionConfig {
            status_interval: session.status_interval,
            ..SessionConfig::with_hold_secs(session.hold_duration)?
        })
    }
}

/// Lifecycle of a session as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not started yet.
    Idle,
    Running,
    /// Stopped by the host.
    Stopped,
    /// The frame source ran out of frames.
    Exhausted,
    /// The frame source failed.
    Failed(String),
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Idle | SessionStatus::Running)
    }
}

/// Counters kept by the frame loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub triggers: u64,
    pub executed: u64,
    pub failed: u64,
    /// Triggers with no command or no callback.
    pub unhandled: u64,
}

/// A trigger and what became of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub trigger: Trigger,
    /// Resolved command, if the gesture is mapped for that hand.
    pub command: Option<Command>,
    pub outcome: DispatchOutcome,
}

/// Per-frame driver: classify, debounce, resolve and dispatch.
pub struct FrameLoop {
    tracker: HoldTracker,
    tables: CommandTables,
    dispatcher: Dispatcher,
    stats: SessionStats,
    status_interval: u64,
}

impl FrameLoop {
    pub fn new(
        config: SessionConfig,
        tables: CommandTables,
        registry: CallbackRegistry,
        now: Instant,
    ) -> FrameLoop {
        FrameLoop {
            tracker: HoldTracker::new(config.hold_duration, now),
            tables,
            dispatcher: Dispatcher::new(registry),
            stats: SessionStats::default(),
            status_interval: config.status_interval,
        }
    }

    pub fn tracker(&self) -> &HoldTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Feed one frame into the hold tracker.
    pub fn advance(&mut self, hands: &[DetectedHand], now: Instant) -> Option<Trigger> {
        let (gesture, hand) = gesture::select_active(hands);
        let previous = self.tracker.state().current_gesture;
        let trigger = self.tracker.observe(gesture, hand, now);

        self.stats.frames += 1;
        if gesture != previous {
            debug!("[session] Gesture {} -> {} ({} hand)", previous, gesture, hand);
        }
        if self.status_interval > 0 && self.stats.frames % self.status_interval == 0 {
            self.log_progress(now);
        }
        trigger
    }

    /// Resolve and dispatch a trigger. The trigger is consumed whatever the
    /// outcome.
    pub fn fire(&mut self, trigger: Trigger) -> Fired {
        self.stats.triggers += 1;

        let command = self.tables.resolve(trigger.gesture, trigger.hand).cloned();
        let outcome = match &command {
            Some(command) => self.dispatcher.dispatch(command, trigger.hand),
            None => {
                debug!(
                    "[session] No command for {} on {} hand",
                    trigger.gesture, trigger.hand
                );
                DispatchOutcome::Unhandled
            }
        };

        match outcome {
            DispatchOutcome::Executed { .. } => self.stats.executed += 1,
            DispatchOutcome::Failed { .. } => self.stats.failed += 1,
            DispatchOutcome::Unhandled => self.stats.unhandled += 1,
        }

        Fired {
            trigger,
            command,
            outcome,
        }
    }

    /// `advance` and `fire` in one step.
    pub fn tick(&mut self, hands: &[DetectedHand], now: Instant) -> Option<Fired> {
        self.advance(hands, now).map(|trigger| self.fire(trigger))
    }

    fn log_progress(&self, now: Instant) {
        let state = self.tracker.state();
        match self.tracker.phase() {
            HoldPhase::Holding => info!(
                "[session] {} frames, holding {} ({:.1}s left)",
                self.stats.frames,
                state.current_gesture,
                self.tracker.remaining(now).as_secs_f32()
            ),
            _ => info!(
                "[session] {} frames, current gesture {}",
                self.stats.frames, state.current_gesture
            ),
        }
    }
}

struct Shared {
    stop: AtomicBool,
    status: Mutex<SessionStatus>,
    stats: Mutex<SessionStats>,
}

impl Shared {
    fn set_status(&self, status: SessionStatus) {
        *self.status.lock() = status;
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Host-side handle to a gesture session.
pub struct Session {
    config: SessionConfig,
    tables: CommandTables,
    /// Present until the session starts.
    registry: Option<CallbackRegistry>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: SessionConfig, tables: CommandTables) -> Session {
        Session {
            config,
            tables,
            registry: Some(CallbackRegistry::new()),
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                status: Mutex::new(SessionStatus::Idle),
                stats: Mutex::new(SessionStats::default()),
            }),
            handle: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tables(&self) -> &CommandTables {
        &self.tables
    }

    /// Registry for bulk registration. Only available before start.
    pub fn callbacks(&mut self) -> Result<&mut CallbackRegistry, SessionError> {
        self.registry.as_mut().ok_or(SessionError::AlreadyStarted)
    }

    /// Bind a dispatch key. The last registration for a key wins.
    pub fn register_callback<F>(&mut self, key: &str, callback: F) -> Result<(), SessionError>
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.callbacks()?.register(key, callback);
        Ok(())
    }

    /// Start the frame loop on its own thread. A session runs once.
    pub fn start<S>(&mut self, source: S) -> Result<(), SessionError>
    where
        S: FrameSource + 'static,
    {
        let registry = self.registry.take().ok_or(SessionError::AlreadyStarted)?;
        info!(
            "[session] Starting with {} callback(s), hold duration {:.2}s",
            registry.len(),
            self.config.hold_duration.as_secs_f32()
        );
        for (gesture, command) in self.tables.entries() {
            debug!("[session] {} ({:?}): {}", gesture, command.hand, command.description);
        }

        let frame_loop = FrameLoop::new(self.config, self.tables.clone(), registry, Instant::now());
        let shared = self.shared.clone();
        shared.set_status(SessionStatus::Running);

        let spawned = thread::Builder::new()
            .name("frame-loop".into())
            .spawn(move || run(frame_loop, source, shared));
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.set_status(SessionStatus::Failed(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Halt the frame loop and wait for it. No trigger dispatches after this
    /// has been called. The frame source is dropped on the way out.
    pub fn stop(&mut self) -> SessionStatus {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.join()
    }

    /// Wait for the frame loop to end on its own (source exhausted or failed).
    pub fn wait(&mut self) -> SessionStatus {
        self.join()
    }

    fn join(&mut self) -> SessionStatus {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[session] Frame loop panicked");
                self.shared
                    .set_status(SessionStatus::Failed("frame loop panicked".to_owned()));
            }
        }
        self.status()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status.lock().clone()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status() == SessionStatus::Running
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run<S: FrameSource>(mut frame_loop: FrameLoop, mut source: S, shared: Arc<Shared>) {
    info!("[session] Frame loop started");

    let status = loop {
        if shared.stop_requested() {
            break SessionStatus::Stopped;
        }

        let frame = match source.next_frame() {
            Ok(SourceEvent::Frame(frame)) => frame,
            Ok(SourceEvent::Idle) => continue,
            Ok(SourceEvent::End) => {
                info!("[session] Frame source exhausted");
                break SessionStatus::Exhausted;
            }
            Err(err) => {
                error!("[session] Frame source failed: {}", err);
                break SessionStatus::Failed(err.to_string());
            }
        };

        let trigger = frame_loop.advance(&frame.hands, Instant::now());
        if let Some(trigger) = trigger {
            if shared.stop_requested() {
                warn!("[session] Dropping {} trigger, session stopping", trigger.gesture);
                break SessionStatus::Stopped;
            }
            frame_loop.fire(trigger);
        }
        *shared.stats.lock() = frame_loop.stats().clone();
    };

    *shared.stats.lock() = frame_loop.stats().clone();
    drop(source);

    info!(
        "[session] Frame loop exiting ({:?}). frames={}, triggers={}, executed={}, failed={}, unhandled={}",
        status,
        frame_loop.stats().frames,
        frame_loop.stats().triggers,
        frame_loop.stats().executed,
        frame_loop.stats().failed,
        frame_loop.stats().unhandled
    );
    shared.set_status(status);
}
