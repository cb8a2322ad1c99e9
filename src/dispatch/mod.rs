//! Named callbacks and the trigger dispatcher.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::commands::Command;
use crate::gesture::HandSide;

/// Errors a callback can report back to the dispatcher.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The background worker that should run the action has shut down.
    #[error("action worker is not running")]
    WorkerGone,
    #[error("{0}")]
    Failed(String),
}

/// A side-effecting action bound to a dispatch key.
pub type Callback = Box<dyn Fn() -> Result<(), ActionError> + Send + Sync>;

/// Dispatch key -> callback. Keys are either hand-qualified
/// (`"left.decrease_brightness"`) or bare action names.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> CallbackRegistry {
        CallbackRegistry::default()
    }

    /// Bind `key` to `callback`. A later registration for the same key wins.
    pub fn register<F>(&mut self, key: &str, callback: F)
    where
        F: Fn() -> Result<(), ActionError> + Send + Sync + 'static,
    {
        if self.callbacks.insert(key.to_owned(), Box::new(callback)).is_some() {
            debug!("[dispatch] Replaced callback {}", key);
        } else {
            debug!("[dispatch] Registered callback {}", key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.callbacks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Find the callback for an action on a hand: hand-qualified key first,
    /// then the bare action name.
    fn lookup(&self, action: &str, hand: HandSide) -> Option<(String, &Callback)> {
        let qualified = qualified_key(hand, action);
        if let Some(callback) = self.callbacks.get(&qualified) {
            return Some((qualified, callback));
        }
        self.callbacks
            .get(action)
            .map(|callback| (action.to_owned(), callback))
    }
}

/// Hand-qualified dispatch key for an action.
pub fn qualified_key(hand: HandSide, action: &str) -> String {
    format!("{}.{}", hand, action)
}

/// What happened to a dispatched trigger. Every variant consumes the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Callback ran and returned Ok; carries the key that matched.
    Executed { key: String },
    /// Callback returned an error or panicked.
    Failed { key: String, reason: String },
    /// No callback under either key.
    Unhandled,
}

/// Invokes callbacks for resolved commands.
pub struct Dispatcher {
    registry: CallbackRegistry,
}

impl Dispatcher {
    pub fn new(registry: CallbackRegistry) -> Dispatcher {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Run the callback for `command` as seen on `hand`.
    ///
    /// Never propagates callback failures: errors and panics are logged and
    /// reported in the outcome.
    pub fn dispatch(&self, command: &Command, hand: HandSide) -> DispatchOutcome {
        let (key, callback) = match self.registry.lookup(&command.action, hand) {
            Some(found) => found,
            None => {
                debug!(
                    "[dispatch] No callback for {} ({} hand), dropping",
                    command.action, hand
                );
                return DispatchOutcome::Unhandled;
            }
        };

        info!("[dispatch] Executing {} via {}", command.description, key);

        match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(Ok(())) => DispatchOutcome::Executed { key },
            Ok(Err(err)) => {
                error!("[dispatch] Callback {} failed: {}", key, err);
                DispatchOutcome::Failed {
                    key,
                    reason: err.to_string(),
                }
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("[dispatch] Callback {} panicked: {}", key, reason);
                DispatchOutcome::Failed { key, reason }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "callback panicked".to_owned()
    }
}
