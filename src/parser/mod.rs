//! Hand frame v1 message format parser.
//!
//! A frame is a version byte followed by any number of hand records:
//!
//! ```text
//! [1] ( [1] [side] [fingers] )*
//! ```
//!
//! `side` is 0 = left, 1 = right, 2 = unknown. `fingers` packs thumb..pinky
//! into bits 0..4.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::gesture::{DetectedHand, FingerVector, HandSide};

pub const PROTOCOL_VERSION: u8 = 1;
const HAND_TAG: u8 = 1;
const FINGER_MASK: u8 = 0b1_1111;

/// Frame buffer and message parser.
pub struct FrameParser {
    /// Hands parsed from the last message, in detection order.
    pub hands: Vec<DetectedHand>,
}

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid protocol version {0}")]
    InvalidProtocolVersion(u8),
    #[error("unknown record tag {0}")]
    UnknownRecord(u8),
    #[error("unknown hand side {0}")]
    UnknownSide(u8),
    #[error("reserved finger bits set: {0:#010b}")]
    InvalidFingers(u8),
    #[error("malformed frame line: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame i/o: {0}")]
    IoError(#[from] io::Error),
}

impl Default for FrameParser {
    fn default() -> Self {
        FrameParser::new()
    }
}

impl FrameParser {
    pub fn new() -> FrameParser {
        FrameParser { hands: vec![] }
    }

    pub fn read_from(&mut self, buf: &mut dyn Read) -> FrameResult<()> {
        self.hands.clear();
        self.read_header(buf)?;
        while self.read_record(buf)? {}
        Ok(())
    }

    fn read_header(&mut self, buf: &mut dyn Read) -> FrameResult<()> {
        match buf.read_u8()? {
            PROTOCOL_VERSION => Ok(()),
            ver => Err(FrameError::InvalidProtocolVersion(ver)),
        }
    }

    /// Read the next hand record. Returns Ok(false) on end-of-data.
    fn read_record(&mut self, buf: &mut dyn Read) -> FrameResult<bool> {
        match buf.read_u8() {
            Ok(HAND_TAG) => self.read_hand(buf)?,
            Ok(tag) => return Err(FrameError::UnknownRecord(tag)),
            // Running out of data between records is ok.
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    fn read_hand(&mut self, buf: &mut dyn Read) -> FrameResult<()> {
        let side = match buf.read_u8()? {
            0 => HandSide::Left,
            1 => HandSide::Right,
            2 => HandSide::Unknown,
            other => return Err(FrameError::UnknownSide(other)),
        };

        let bits = buf.read_u8()?;
        if bits & !FINGER_MASK != 0 {
            return Err(FrameError::InvalidFingers(bits));
        }

        self.hands.push(DetectedHand::new(side, FingerVector::from_bits(bits)));
        Ok(())
    }
}

/// Serialize a frame in the same format, for detector shims and tests.
pub fn write_frame(buf: &mut dyn Write, hands: &[DetectedHand]) -> io::Result<()> {
    buf.write_u8(PROTOCOL_VERSION)?;
    for hand in hands {
        buf.write_u8(HAND_TAG)?;
        buf.write_u8(match hand.side {
            HandSide::Left => 0,
            HandSide::Right => 1,
            HandSide::Unknown => 2,
        })?;
        buf.write_u8(hand.fingers.to_bits())?;
    }
    Ok(())
}
