//! UDP frame listener.

use std::io::{self, Cursor};
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::{frame_slot, ChannelSource, Frame, FrameSender, Publish, POLL_INTERVAL};
use crate::parser::FrameParser;

const MAX_PACKET_SIZE: usize = 4096;

/// A running UDP listener. Frames arrive through [`UdpListener::source`].
pub struct UdpListener {
    /// Address the socket is bound to.
    pub local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl UdpListener {
    /// Wait for the listener thread to exit. It exits once the frame source
    /// it feeds has been dropped.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("[udp] Listener thread panicked");
        }
    }
}

/// Bind `udp_addr` and start a thread that parses hand frames from incoming
/// packets and publishes them to the returned source.
pub fn start_udp_thread(udp_addr: &str) -> io::Result<(UdpListener, ChannelSource)> {
    let socket = UdpSocket::bind(udp_addr)?;
    socket.set_read_timeout(Some(POLL_INTERVAL))?;
    let local_addr = socket.local_addr()?;
    info!("[udp] Listening for hand frames at {}", local_addr);

    let (sender, source) = frame_slot();
    let handle = thread::Builder::new()
        .name("udp-frames".into())
        .spawn(move || receive_loop(socket, sender))?;

    Ok((UdpListener { local_addr, handle }, source))
}

fn receive_loop(socket: UdpSocket, sender: FrameSender) {
    let mut parser = FrameParser::new();
    let mut buf = [0; MAX_PACKET_SIZE];

    while !sender.is_closed() {
        let (len, source) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(err) => {
                warn!("[udp] Receive failed: {}", err);
                continue;
            }
        };

        if let Err(err) = parser.read_from(&mut Cursor::new(&buf[..len])) {
            warn!("[udp] Bad frame from {}: {}", source, err);
            continue;
        }

        match sender.publish(Frame::new(parser.hands.clone())) {
            Publish::Delivered => {}
            Publish::ReplacedStale => debug!("[udp] Dropped a stale frame"),
            Publish::Closed => break,
        }
    }

    info!("[udp] Frame consumer gone. Exiting thread.");
}
