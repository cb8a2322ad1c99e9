use std::env;
use std::error::Error;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gesturelight_rs::actions::{self, DeviceWorker, LightAction};
use gesturelight_rs::config;
use gesturelight_rs::listener::{udp, ReplaySource};
use gesturelight_rs::mapper::Mapper;
use gesturelight_rs::session::{Session, SessionConfig, SessionStatus};

/// Usage: gestureserver [config.yaml] [recording.jsonl]
///
/// Without a recording, hand frames are read from the configured UDP address.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| gesturelight_rs::default_log_filter("gestureserver").into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "./config.yaml".to_owned());
    let replay_path = args.next();

    let config_root = config::read_config(&config_path)?;
    info!("Loaded {}", config_path);

    let tables = config_root.command_tables();
    for action in tables.actions() {
        if action.parse::<LightAction>().is_err() {
            warn!("Action {} has no light action and will be dropped", action);
        }
    }

    let worker = DeviceWorker::start(Mapper::from_config(&config_root)?)?;

    let mut session = Session::new(SessionConfig::from_config(&config_root.session)?, tables);
    actions::register_light_actions(session.callbacks()?, &worker.sender());

    let listener = match replay_path {
        Some(path) => {
            info!("Replaying hand frames from {}", path);
            session.start(ReplaySource::open(&path)?)?;
            None
        }
        None => {
            let (listener, source) = udp::start_udp_thread(&config_root.session.udp_addr)?;
            session.start(source)?;
            Some(listener)
        }
    };

    let status = session.wait();
    let stats = session.stats();
    info!(
        "Session ended: {:?} after {} frames, {} triggers ({} executed)",
        status, stats.frames, stats.triggers, stats.executed
    );

    drop(session);
    if let Some(listener) = listener {
        listener.join();
    }
    worker.shutdown();

    match status {
        SessionStatus::Failed(reason) => {
            error!("Frame source failed: {}", reason);
            Err(reason.into())
        }
        _ => Ok(()),
    }
}
