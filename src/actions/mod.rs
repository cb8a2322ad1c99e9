//! The light action catalogue and the device worker that runs it.
//!
//! Callbacks registered here never touch the network themselves: they queue
//! the action for the worker thread, which owns the [`Mapper`] and executes
//! actions one at a time.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{error, info, warn};

use crate::dispatch::{ActionError, CallbackRegistry};
use crate::mapper::Mapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightAction {
    CloseAll,
    OpenAll,
    ToggleDevice,
    IncreaseBrightness,
    DecreaseBrightness,
    MaxBrightness,
    MinBrightness,
    IncreaseColorTemp,
    DecreaseColorTemp,
    SetWarmColorTemp,
    SetCoolColorTemp,
}

impl LightAction {
    pub const ALL: [LightAction; 11] = [
        LightAction::CloseAll,
        LightAction::OpenAll,
        LightAction::ToggleDevice,
        LightAction::IncreaseBrightness,
        LightAction::DecreaseBrightness,
        LightAction::MaxBrightness,
        LightAction::MinBrightness,
        LightAction::IncreaseColorTemp,
        LightAction::DecreaseColorTemp,
        LightAction::SetWarmColorTemp,
        LightAction::SetCoolColorTemp,
    ];

    /// Action name as used in command tables and dispatch keys.
    pub fn name(self) -> &'static str {
        match self {
            LightAction::CloseAll => "close_all",
            LightAction::OpenAll => "open_all",
            LightAction::ToggleDevice => "toggle_device",
            LightAction::IncreaseBrightness => "increase_brightness",
            LightAction::DecreaseBrightness => "decrease_brightness",
            LightAction::MaxBrightness => "max_brightness",
            LightAction::MinBrightness => "min_brightness",
            LightAction::IncreaseColorTemp => "increase_color_temp",
            LightAction::DecreaseColorTemp => "decrease_color_temp",
            LightAction::SetWarmColorTemp => "set_warm_color_temp",
            LightAction::SetCoolColorTemp => "set_cool_color_temp",
        }
    }
}

impl fmt::Display for LightAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LightAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LightAction::ALL
            .iter()
            .copied()
            .find(|action| action.name() == s)
            .ok_or_else(|| format!("unknown light action: {}", s))
    }
}

enum WorkerMessage {
    Run(LightAction),
    Stop,
}

/// Cloneable handle for queueing actions on the worker.
#[derive(Clone)]
pub struct ActionSender {
    sender: Sender<WorkerMessage>,
}

impl ActionSender {
    /// Queue an action. Fails only if the worker has exited.
    pub fn send(&self, action: LightAction) -> Result<(), ActionError> {
        self.sender
            .send(WorkerMessage::Run(action))
            .map_err(|_| ActionError::WorkerGone)
    }
}

/// Background thread that owns the lights.
pub struct DeviceWorker {
    sender: ActionSender,
    handle: JoinHandle<Mapper>,
}

impl DeviceWorker {
    pub fn start(mapper: Mapper) -> io::Result<DeviceWorker> {
        let (sender, receiver) = channel::unbounded();
        let handle = thread::Builder::new()
            .name("device-worker".into())
            .spawn(move || run(mapper, receiver))?;
        Ok(DeviceWorker {
            sender: ActionSender { sender },
            handle,
        })
    }

    pub fn sender(&self) -> ActionSender {
        self.sender.clone()
    }

    /// Finish the queued actions, stop the thread and hand the mapper back.
    pub fn shutdown(self) -> Option<Mapper> {
        self.sender.sender.send(WorkerMessage::Stop).ok();
        match self.handle.join() {
            Ok(mapper) => Some(mapper),
            Err(_) => {
                error!("[worker] Device worker panicked");
                None
            }
        }
    }
}

fn run(mut mapper: Mapper, receiver: Receiver<WorkerMessage>) -> Mapper {
    info!("[worker] Device worker started");
    for message in receiver.iter() {
        match message {
            WorkerMessage::Run(action) => match mapper.apply(action) {
                Ok(()) => info!("[worker] Finished {}", action),
                Err(err) => warn!("[worker] {} failed: {}", action, err),
            },
            WorkerMessage::Stop => break,
        }
    }
    info!("[worker] Device worker exiting");
    mapper
}

/// Register a callback for every light action under its bare name.
pub fn register_light_actions(registry: &mut CallbackRegistry, sender: &ActionSender) {
    for action in LightAction::ALL.iter().copied() {
        let sender = sender.clone();
        registry.register(action.name(), move || sender.send(action));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{default_tables, Command, HandScope};
    use crate::dispatch::{DispatchOutcome, Dispatcher};
    use crate::gesture::HandSide;
    use crate::host::LogHost;
    use crate::mapper::Steps;

    #[test]
    fn every_table_action_is_a_light_action() {
        for action in default_tables().actions() {
            assert!(action.parse::<LightAction>().is_ok(), "{} has no light action", action);
        }
    }

    #[test]
    fn dispatched_actions_reach_the_lights() {
        let mut mapper = Mapper::new(Steps::default());
        mapper.add_host("dry", Box::new(LogHost::new("dry")));
        mapper.add_light(0, Some("desk"), "dry").unwrap();

        let worker = DeviceWorker::start(mapper).unwrap();
        let mut registry = CallbackRegistry::new();
        register_light_actions(&mut registry, &worker.sender());
        let dispatcher = Dispatcher::new(registry);

        let open = Command::new("open_all", "open", HandScope::Both);
        let dim = Command::new("decrease_brightness", "dim", HandScope::Left);
        assert!(matches!(dispatcher.dispatch(&open, HandSide::Right), DispatchOutcome::Executed { .. }));
        assert!(matches!(dispatcher.dispatch(&dim, HandSide::Left), DispatchOutcome::Executed { .. }));

        let mapper = worker.shutdown().unwrap();
        let state = mapper.state(0).unwrap();
        assert!(state.power);
        assert_eq!(state.brightness, 80);

        // Worker gone: callbacks report it instead of blocking.
        assert!(matches!(
            dispatcher.dispatch(&open, HandSide::Right),
            DispatchOutcome::Failed { .. }
        ));
    }
}
