//! Hand gesture control for networked lights.
//!
//! Per-frame hand detections are classified ([`gesture`]), debounced into
//! single triggers ([`hold`]), resolved to per-hand commands ([`commands`])
//! and dispatched to registered callbacks ([`dispatch`]) by a [`session`].
//! The stock callbacks queue [`actions`] on a worker that drives the lights
//! through the [`mapper`] and its [`host`] devices.

pub mod actions;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod gesture;
pub mod hold;
pub mod host;
pub mod listener;
pub mod mapper;
pub mod parser;
pub mod session;

/// `EnvFilter` directives used when `RUST_LOG` is not set: info for this
/// library and the named binary.
pub fn default_log_filter(bin: &str) -> String {
    format!("gesturelight_rs=info,{}=info", bin)
}
