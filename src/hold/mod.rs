//! Hold-duration debounce for the per-frame gesture stream.
//!
//! A gesture has to be observed continuously for the hold duration before it
//! triggers, and it triggers once per hold. Changing the observed label (to
//! another gesture or to `None`) restarts the timer and re-arms the trigger.

use std::time::{Duration, Instant};

use crate::gesture::{GestureLabel, HandSide};

/// Default time a gesture must be held before it triggers.
pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(2);

/// Emitted once per qualifying hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub gesture: GestureLabel,
    /// Hand observed on the tick that fired.
    pub hand: HandSide,
}

/// Where the tracker currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPhase {
    Idle,
    Holding,
    Fired,
}

/// The single piece of state carried between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldState {
    pub current_gesture: GestureLabel,
    pub hold_start: Instant,
    pub fired: bool,
}

#[derive(Debug)]
pub struct HoldTracker {
    state: HoldState,
    hold_duration: Duration,
}

impl HoldTracker {
    /// Start out idle. `hold_duration` must be non-zero; the config layer
    /// validates it before a tracker is built.
    pub fn new(hold_duration: Duration, now: Instant) -> HoldTracker {
        HoldTracker {
            state: HoldState {
                current_gesture: GestureLabel::None,
                hold_start: now,
                fired: false,
            },
            hold_duration,
        }
    }

    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }

    pub fn state(&self) -> &HoldState {
        &self.state
    }

    pub fn phase(&self) -> HoldPhase {
        if self.state.current_gesture.is_none() {
            HoldPhase::Idle
        } else if self.state.fired {
            HoldPhase::Fired
        } else {
            HoldPhase::Holding
        }
    }

    /// How long the current gesture has been held.
    pub fn held_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.hold_start)
    }

    /// Time left before the current hold fires. Zero once idle or fired.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.phase() {
            HoldPhase::Holding => self.hold_duration.saturating_sub(self.held_for(now)),
            _ => Duration::from_secs(0),
        }
    }

    /// Advance by one tick.
    ///
    /// Only the label is tracked: the same gesture moving from one hand to the
    /// other keeps its timer, and the trigger reports whichever hand was seen
    /// on the tick that fired.
    pub fn observe(&mut self, gesture: GestureLabel, hand: HandSide, now: Instant) -> Option<Trigger> {
        if gesture != self.state.current_gesture {
            self.state = HoldState {
                current_gesture: gesture,
                hold_start: now,
                fired: false,
            };
            return None;
        }

        if gesture.is_none() || self.state.fired {
            return None;
        }

        if self.held_for(now) >= self.hold_duration {
            self.state.fired = true;
            return Some(Trigger { gesture, hand });
        }

        None
    }
}
