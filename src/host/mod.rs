//! Host devices receive light commands and produce physical effects.

use std::io;

pub mod log;
pub mod proxy;
pub mod udpclient;

pub use self::log::LogHost;
pub use self::proxy::UdpProxy;

/// Light hosts accept RGB commands and pass them on to real lights.
pub trait LightHost: Send {
    /// Accept a single light command.
    fn take_command(&mut self, cmd: &LightCommand);
    /// Send everything taken since the last flush.
    fn flush(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    Rgb { id: u8, red: u8, green: u8, blue: u8 },
}
