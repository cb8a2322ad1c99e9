use std::io::{self, Cursor};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use gesturelight_rs::actions::{register_light_actions, DeviceWorker};
use gesturelight_rs::commands::default_tables;
use gesturelight_rs::gesture::{DetectedHand, FingerVector, HandSide};
use gesturelight_rs::host::LogHost;
use gesturelight_rs::listener::{udp, Frame, FrameSource, ReplaySource, ScriptedSource, SourceEvent};
use gesturelight_rs::mapper::{Mapper, Steps};
use gesturelight_rs::parser::{write_frame, FrameError, FrameResult};
use gesturelight_rs::session::{Session, SessionConfig, SessionStatus};

const TICK: Duration = Duration::from_millis(10);

fn config() -> SessionConfig {
    SessionConfig {
        hold_duration: Duration::from_millis(100),
        status_interval: 0,
    }
}

fn frame(side: HandSide, fingers: FingerVector) -> Frame {
    Frame::new(vec![DetectedHand::new(side, fingers)])
}

fn thumbs_up(side: HandSide) -> Frame {
    frame(side, FingerVector::new(true, false, false, false, false))
}

fn palm(side: HandSide) -> Frame {
    frame(side, FingerVector([true; 5]))
}

/// Registers a callback for each key that appends the key to a shared log.
fn record(session: &mut Session, keys: &[&str]) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(vec![]));
    for key in keys {
        let log = log.clone();
        let name = key.to_string();
        session
            .register_callback(key, move || {
                log.lock().push(name.clone());
                Ok(())
            })
            .unwrap();
    }
    log
}

#[test]
fn each_hold_fires_once_with_hand_specific_actions() {
    let mut session = Session::new(config(), default_tables());
    let log = record(
        &mut session,
        &["open_all", "increase_brightness", "decrease_brightness"],
    );

    let mut script = ScriptedSource::new();
    script
        .repeat(40, TICK, thumbs_up(HandSide::Left))
        .repeat(5, TICK, Frame::default())
        .repeat(40, TICK, thumbs_up(HandSide::Right))
        .repeat(5, TICK, Frame::default())
        .repeat(40, TICK, palm(HandSide::Left));

    session.start(script).unwrap();
    assert_eq!(session.wait(), SessionStatus::Exhausted);

    assert_eq!(
        *log.lock(),
        vec!["decrease_brightness", "increase_brightness", "open_all"]
    );
    let stats = session.stats();
    assert_eq!(stats.frames, 130);
    assert_eq!(stats.triggers, 3);
    assert_eq!(stats.executed, 3);
}

#[test]
fn hand_qualified_callback_takes_precedence() {
    let mut session = Session::new(config(), default_tables());
    let log = record(&mut session, &["open_all", "right.open_all"]);

    let mut script = ScriptedSource::new();
    script
        .repeat(30, TICK, palm(HandSide::Right))
        .repeat(5, TICK, Frame::default())
        .repeat(30, TICK, palm(HandSide::Left));

    session.start(script).unwrap();
    session.wait();
    assert_eq!(*log.lock(), vec!["right.open_all", "open_all"]);
}

#[test]
fn flicker_shorter_than_the_hold_never_fires() {
    let mut session = Session::new(config(), default_tables());
    let log = record(&mut session, &["open_all", "close_all"]);

    let mut script = ScriptedSource::new();
    for _ in 0..10 {
        script
            .repeat(2, TICK, palm(HandSide::Left))
            .repeat(2, TICK, frame(HandSide::Left, FingerVector::default()));
    }

    session.start(script).unwrap();
    session.wait();
    assert!(log.lock().is_empty());
    assert_eq!(session.stats().triggers, 0);
}

/// Holds a fist forever and notes when it gets dropped.
struct EndlessFist {
    dropped: Arc<AtomicBool>,
}

impl FrameSource for EndlessFist {
    fn next_frame(&mut self) -> FrameResult<SourceEvent> {
        thread::sleep(TICK);
        Ok(SourceEvent::Frame(frame(HandSide::Left, FingerVector::default())))
    }
}

impl Drop for EndlessFist {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn stop_halts_the_loop_and_releases_the_source() {
    let config = SessionConfig {
        hold_duration: Duration::from_secs(30),
        status_interval: 0,
    };
    let mut session = Session::new(config, default_tables());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    session
        .register_callback("close_all", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    let dropped = Arc::new(AtomicBool::new(false));
    session
        .start(EndlessFist {
            dropped: dropped.clone(),
        })
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(session.is_running());

    assert_eq!(session.stop(), SessionStatus::Stopped);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(session.stats().frames > 0);
}

#[test]
fn stop_is_prompt_during_a_long_recorded_pause() {
    let recording = concat!(
        "{\"hands\": [{\"side\": \"left\", \"fingers\": [true, true, true, true, true]}], \"delay_ms\": 5}\n",
        "{\"hands\": [], \"delay_ms\": 3000}\n",
    );
    let mut session = Session::new(config(), default_tables());
    session.start(ReplaySource::new(Cursor::new(recording))).unwrap();
    thread::sleep(Duration::from_millis(100));

    let stopping = Instant::now();
    assert_eq!(session.stop(), SessionStatus::Stopped);
    assert!(stopping.elapsed() < Duration::from_millis(500));
    assert_eq!(session.stats().frames, 1);
}

struct BrokenCamera;

impl FrameSource for BrokenCamera {
    fn next_frame(&mut self) -> FrameResult<SourceEvent> {
        Err(FrameError::IoError(io::Error::new(io::ErrorKind::Other, "camera unplugged")))
    }
}

#[test]
fn source_failure_is_a_terminal_status() {
    let mut session = Session::new(config(), default_tables());
    session.start(BrokenCamera).unwrap();
    match session.wait() {
        SessionStatus::Failed(reason) => assert!(reason.contains("camera unplugged")),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(session.status().is_terminal());
}

#[test]
fn udp_frames_drive_the_lights() {
    let mut mapper = Mapper::new(Steps::default());
    mapper.add_host("dry", Box::new(LogHost::new("dry")));
    mapper.add_light(0, Some("desk"), "dry").unwrap();
    let worker = DeviceWorker::start(mapper).unwrap();

    let mut session = Session::new(config(), default_tables());
    register_light_actions(session.callbacks().unwrap(), &worker.sender());

    let (listener, source) = udp::start_udp_thread("127.0.0.1:0").unwrap();
    let target = listener.local_addr;
    session.start(source).unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut packet = vec![];
    write_frame(
        &mut packet,
        &[DetectedHand::new(HandSide::Right, FingerVector([true; 5]))],
    )
    .unwrap();
    for _ in 0..40 {
        client.send_to(&packet, target).unwrap();
        thread::sleep(TICK);
    }

    assert_eq!(session.stop(), SessionStatus::Stopped);
    assert_eq!(session.stats().executed, 1);
    drop(session);
    listener.join();

    let mapper = worker.shutdown().unwrap();
    assert!(mapper.state(0).unwrap().power);
}
