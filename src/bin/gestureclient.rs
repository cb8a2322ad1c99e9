use std::env;
use std::error::Error;
use std::net::UdpSocket;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use gesturelight_rs::gesture::{DetectedHand, FingerVector, HandSide};
use gesturelight_rs::listener::{Frame, FrameSource, ReplaySource, ScriptedSource, SourceEvent};
use gesturelight_rs::parser::write_frame;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Usage: gestureclient [addr] [recording.jsonl]
///
/// Sends hand frames to a gesture server, either from a recording or a
/// built-in demo that holds a few gestures in turn.
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| gesturelight_rs::default_log_filter("gestureclient").into()),
        )
        .init();

    let mut args = env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "localhost:9910".to_owned());

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(&addr)?;

    let mut source: Box<dyn FrameSource> = match args.next() {
        Some(path) => Box::new(ReplaySource::open(path)?),
        None => Box::new(demo()),
    };

    let mut packet = Vec::with_capacity(64);
    let mut sent = 0;
    loop {
        match source.next_frame()? {
            SourceEvent::Frame(frame) => {
                packet.clear();
                write_frame(&mut packet, &frame.hands)?;
                socket.send(&packet)?;
                sent += 1;
            }
            SourceEvent::Idle => continue,
            SourceEvent::End => break,
        }
    }

    info!("Sent {} frames to {}", sent, addr);
    Ok(())
}

/// Hold each gesture for three seconds with a short empty gap in between.
fn demo() -> ScriptedSource {
    let frames_per_hold = (3000 / FRAME_INTERVAL.as_millis()) as usize;
    let gap = (500 / FRAME_INTERVAL.as_millis()) as usize;

    let holds = [
        (HandSide::Right, FingerVector([true; 5])),
        (HandSide::Right, FingerVector::new(true, false, false, false, false)),
        (HandSide::Left, FingerVector::new(true, false, false, false, false)),
        (HandSide::Left, FingerVector::new(false, true, true, true, false)),
        (HandSide::Right, FingerVector::default()),
    ];

    let mut script = ScriptedSource::new();
    for (side, fingers) in holds.iter() {
        script.repeat(frames_per_hold, FRAME_INTERVAL, Frame::new(vec![DetectedHand::new(*side, *fingers)]));
        script.repeat(gap, FRAME_INTERVAL, Frame::default());
    }
    script
}
