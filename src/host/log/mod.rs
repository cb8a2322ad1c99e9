//! Dry-run host that only logs.

use std::io;

use tracing::info;

use super::{LightCommand, LightHost};

#[derive(Debug, Default)]
pub struct LogHost {
    name: String,
    pending: Vec<LightCommand>,
}

impl LogHost {
    pub fn new(name: &str) -> LogHost {
        LogHost {
            name: name.to_owned(),
            pending: vec![],
        }
    }
}

impl LightHost for LogHost {
    fn take_command(&mut self, cmd: &LightCommand) {
        self.pending.push(*cmd);
    }

    fn flush(&mut self) -> io::Result<()> {
        for cmd in self.pending.drain(..) {
            match cmd {
                LightCommand::Rgb { id, red, green, blue } => {
                    info!("[{}] light {} -> rgb({}, {}, {})", self.name, id, red, green, blue);
                }
            }
        }
        Ok(())
    }
}
