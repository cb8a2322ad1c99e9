//! Client for the effect server v1 light protocol.

use std::io::{self, Write};
use std::net::UdpSocket;

use byteorder::WriteBytesExt;
use parking_lot::Mutex;

const API_VERSION: u8 = 1;
const NICK_TAG: u8 = 0;
const LIGHT_TAG: u8 = 1;
const LIGHT_TYPE_RGB: u8 = 0;

/// Raw parameters for a RGB light command.
/// The first u8 is the light's logical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightParam(pub u8, pub u8, pub u8, pub u8);

impl LightParam {
    pub fn new(num: u8, red: u8, green: u8, blue: u8) -> LightParam {
        LightParam(num, red, green, blue)
    }
}

/// Encode a v1 message: version, nick tag, NUL-terminated nick, then one
/// record per light.
pub fn encode(buf: &mut Vec<u8>, nick: &str, lights: &[LightParam]) -> io::Result<()> {
    buf.clear();
    buf.write_u8(API_VERSION)?;
    buf.write_u8(NICK_TAG)?;
    buf.write_all(nick.as_bytes())?;
    buf.write_u8(0)?;
    for light in lights {
        buf.write_u8(LIGHT_TAG)?;
        buf.write_u8(light.0)?;
        buf.write_u8(LIGHT_TYPE_RGB)?;
        buf.write_u8(light.1)?;
        buf.write_u8(light.2)?;
        buf.write_u8(light.3)?;
    }
    Ok(())
}

/// Sends commands to an effect server.
pub struct UdpClient {
    /// UDP socket reused between calls.
    socket: UdpSocket,
    /// Buffer reused between calls.
    buf: Mutex<Vec<u8>>,
}

impl UdpClient {
    /// Build a new UdpClient instance set to talk to a specific address.
    pub fn new(addr: &str) -> io::Result<UdpClient> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(addr)?;
        Ok(UdpClient {
            socket,
            buf: Mutex::new(Vec::with_capacity(256)),
        })
    }

    /// Send a message to the effect server.
    pub fn set(&self, nick: &str, lights: &[LightParam]) -> io::Result<usize> {
        let mut buf = self.buf.lock();
        encode(&mut buf, nick, lights)?;
        self.socket.send(&buf)
    }
}
