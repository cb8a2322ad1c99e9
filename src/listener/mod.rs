//! Frame sources: where detected hands come from.
//!
//! The frame loop pulls from a [`FrameSource`]. Sources fed by another thread
//! (the UDP listener) hand frames over through a depth-1 slot that throws the
//! stale frame away instead of blocking the producer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::gesture::DetectedHand;
use crate::parser::FrameResult;

pub mod replay;
pub mod udp;

pub use self::replay::ReplaySource;
pub use self::udp::UdpListener;

/// How long a source may block before handing control back to the loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hands detected in one camera frame, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub hands: Vec<DetectedHand>,
}

impl Frame {
    pub fn new(hands: Vec<DetectedHand>) -> Frame {
        Frame { hands }
    }
}

/// Result of polling a source once.
#[derive(Debug)]
pub enum SourceEvent {
    Frame(Frame),
    /// Nothing arrived within the poll interval.
    Idle,
    /// The source has no more frames.
    End,
}

/// Supplies frames to the frame loop. Dropping the source releases whatever
/// capture resource it holds.
pub trait FrameSource: Send {
    /// Wait for the next frame, blocking for at most roughly [`POLL_INTERVAL`].
    fn next_frame(&mut self) -> FrameResult<SourceEvent>;
}

/// What happened to a published frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Delivered,
    /// The unread frame in the slot was discarded to make room.
    ReplacedStale,
    /// The consuming side is gone.
    Closed,
}

/// Producer half of the frame slot.
pub struct FrameSender {
    tx: Sender<Frame>,
    /// Producer-side handle used to evict the stale frame.
    stale: Receiver<Frame>,
    closed: Arc<AtomicBool>,
}

/// Consumer half of the frame slot.
pub struct ChannelSource {
    rx: Receiver<Frame>,
    closed: Arc<AtomicBool>,
}

/// Create a single-producer/single-consumer slot holding at most one frame.
pub fn frame_slot() -> (FrameSender, ChannelSource) {
    let (tx, rx) = channel::bounded::<Frame>(1);
    let closed = Arc::new(AtomicBool::new(false));
    (
        FrameSender {
            tx,
            stale: rx.clone(),
            closed: closed.clone(),
        },
        ChannelSource { rx, closed },
    )
}

impl FrameSender {
    /// Put a frame in the slot without blocking, replacing any unread one.
    pub fn publish(&self, frame: Frame) -> Publish {
        if self.is_closed() {
            return Publish::Closed;
        }
        let mut frame = frame;
        let mut replaced = false;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) if replaced => return Publish::ReplacedStale,
                Ok(()) => return Publish::Delivered,
                Err(TrySendError::Full(back)) => {
                    // The consumer may grab it first; either way there is room next round.
                    replaced |= self.stale.try_recv().is_ok();
                    frame = back;
                }
                Err(TrySendError::Disconnected(_)) => return Publish::Closed,
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FrameSource for ChannelSource {
    fn next_frame(&mut self) -> FrameResult<SourceEvent> {
        match self.rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => Ok(SourceEvent::Frame(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(SourceEvent::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(SourceEvent::End),
        }
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Holds a frame back until it is due, waiting at most one poll interval per call.
#[derive(Debug, Default)]
pub(crate) struct Pacer {
    pending: Option<(Instant, Frame)>,
}

impl Pacer {
    pub(crate) fn hold(&mut self, delay: Duration, frame: Frame) {
        self.pending = Some((Instant::now() + delay, frame));
    }

    /// `None` when nothing is held back.
    pub(crate) fn poll(&mut self) -> Option<SourceEvent> {
        let due = self.pending.as_ref()?.0;
        let now = Instant::now();
        if due > now {
            thread::sleep((due - now).min(POLL_INTERVAL));
        }
        if Instant::now() < due {
            return Some(SourceEvent::Idle);
        }
        self.pending.take().map(|(_, frame)| SourceEvent::Frame(frame))
    }
}

/// A fixed list of frames, each preceded by a pause. Ends after the last one.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<(Duration, Frame)>,
    pacer: Pacer,
}

impl ScriptedSource {
    pub fn new() -> ScriptedSource {
        ScriptedSource::default()
    }

    /// Queue `frame` to be delivered `delay` after the previous one.
    pub fn push(&mut self, delay: Duration, frame: Frame) -> &mut Self {
        self.frames.push_back((delay, frame));
        self
    }

    /// Queue `count` copies of `frame`, `interval` apart.
    pub fn repeat(&mut self, count: usize, interval: Duration, frame: Frame) -> &mut Self {
        for _ in 0..count {
            self.push(interval, frame.clone());
        }
        self
    }

    /// Frames not yet delivered.
    pub fn len(&self) -> usize {
        self.frames.len() + self.pacer.pending.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> FrameResult<SourceEvent> {
        if let Some(event) = self.pacer.poll() {
            return Ok(event);
        }
        match self.frames.pop_front() {
            Some((delay, frame)) => {
                self.pacer.hold(delay, frame);
                Ok(self.pacer.poll().unwrap_or(SourceEvent::Idle))
            }
            None => Ok(SourceEvent::End),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{FingerVector, HandSide};

    fn frame(bits: u8) -> Frame {
        Frame::new(vec![DetectedHand::new(HandSide::Left, FingerVector::from_bits(bits))])
    }

    fn expect_frame(source: &mut ChannelSource) -> Frame {
        match source.next_frame().unwrap() {
            SourceEvent::Frame(frame) => frame,
            other => panic!("expected a frame, got {:?}", other),
        }
    }

    #[test]
    fn slot_keeps_only_the_newest_frame() {
        let (sender, mut source) = frame_slot();
        assert_eq!(sender.publish(frame(1)), Publish::Delivered);
        assert_eq!(sender.publish(frame(2)), Publish::ReplacedStale);
        assert_eq!(sender.publish(frame(3)), Publish::ReplacedStale);

        assert_eq!(expect_frame(&mut source), frame(3));
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::Idle));
    }

    #[test]
    fn slot_reports_both_ends_closing() {
        let (sender, source) = frame_slot();
        drop(source);
        assert_eq!(sender.publish(frame(1)), Publish::Closed);

        let (sender, mut source) = frame_slot();
        drop(sender);
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::End));
    }

    #[test]
    fn scripted_source_plays_in_order_then_ends() {
        let mut source = ScriptedSource::new();
        source
            .push(Duration::from_millis(0), frame(1))
            .repeat(2, Duration::from_millis(1), frame(2));
        assert_eq!(source.len(), 3);

        let mut seen = vec![];
        loop {
            match source.next_frame().unwrap() {
                SourceEvent::Frame(frame) => seen.push(frame),
                SourceEvent::Idle => continue,
                SourceEvent::End => break,
            }
        }
        assert_eq!(seen, vec![frame(1), frame(2), frame(2)]);
    }

    #[test]
    fn long_pause_comes_back_as_idle_polls() {
        let mut source = ScriptedSource::new();
        source.push(Duration::from_millis(350), frame(4));

        let started = Instant::now();
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::Idle));
        assert!(started.elapsed() < POLL_INTERVAL * 2);
        assert_eq!(source.len(), 1);

        let mut idle = 1;
        let delivered = loop {
            match source.next_frame().unwrap() {
                SourceEvent::Frame(frame) => break frame,
                SourceEvent::Idle => idle += 1,
                SourceEvent::End => panic!("frame was lost"),
            }
        };
        assert_eq!(delivered, frame(4));
        assert!(idle >= 3);
        assert!(started.elapsed() >= Duration::from_millis(350));
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::End));
    }
}
