//! Effect server proxy host.

use std::io;

use super::udpclient::{LightParam, UdpClient};
use super::{LightCommand, LightHost};

const DEFAULT_NICK: &str = "gesturelight";

/// The UDP proxy host passes light state on to an effect server.
pub struct UdpProxy {
    client: UdpClient,
    nick: String,
    cmds: Vec<LightParam>,
}

impl UdpProxy {
    pub fn new(addr: &str, nick: Option<&str>) -> io::Result<UdpProxy> {
        Ok(UdpProxy {
            client: UdpClient::new(addr)?,
            nick: nick.unwrap_or(DEFAULT_NICK).to_owned(),
            cmds: vec![],
        })
    }
}

impl LightHost for UdpProxy {
    fn take_command(&mut self, cmd: &LightCommand) {
        match *cmd {
            LightCommand::Rgb { id, red, green, blue } => {
                // Only the latest state per light goes out.
                self.cmds.retain(|param| param.0 != id);
                self.cmds.push(LightParam::new(id, red, green, blue));
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.cmds.is_empty() {
            return Ok(());
        }
        let result = self.client.set(&self.nick, self.cmds.as_slice());
        self.cmds.clear();
        result.map(|_| ())
    }
}
