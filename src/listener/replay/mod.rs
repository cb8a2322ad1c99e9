//! JSON-lines replay of recorded detector output.
//!
//! One frame per line:
//!
//! ```text
//! {"hands": [{"side": "left", "fingers": [false, true, false, false, false]}], "delay_ms": 33}
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{Frame, FrameSource, Pacer, SourceEvent};
use crate::gesture::DetectedHand;
use crate::parser::FrameResult;

#[derive(Deserialize, Debug)]
struct ReplayLine {
    #[serde(default)]
    hands: Vec<DetectedHand>,
    /// Pause before this frame is emitted.
    #[serde(default)]
    delay_ms: u64,
}

/// Plays frames back from a JSON-lines reader.
pub struct ReplaySource<R> {
    lines: io::Lines<R>,
    line_no: usize,
    pacer: Pacer,
}

impl ReplaySource<BufReader<File>> {
    pub fn open<T: AsRef<Path>>(path: T) -> io::Result<Self> {
        Ok(ReplaySource::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> ReplaySource<R> {
        ReplaySource {
            lines: reader.lines(),
            line_no: 0,
            pacer: Pacer::default(),
        }
    }

    /// Line number of the last line read, starting at 1.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead + Send> FrameSource for ReplaySource<R> {
    fn next_frame(&mut self) -> FrameResult<SourceEvent> {
        if let Some(event) = self.pacer.poll() {
            return Ok(event);
        }
        loop {
            let line = match self.lines.next() {
                Some(line) => line?,
                None => return Ok(SourceEvent::End),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let entry: ReplayLine = serde_json::from_str(&line)?;
            self.pacer.hold(Duration::from_millis(entry.delay_ms), Frame::new(entry.hands));
            return Ok(self.pacer.poll().unwrap_or(SourceEvent::Idle));
        }
    }
}
