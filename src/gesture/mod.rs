//! Hand poses and the finger-count gesture classifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gestures the classifier can recognize.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    None,
    Fist,
    OpenPalm,
    Peace,
    ThumbsUp,
    PointingUp,
    OneFinger,
    TwoFingers,
    ThreeFingers,
}

impl GestureLabel {
    /// Every label, in declaration order.
    pub const ALL: [GestureLabel; 9] = [
        GestureLabel::None,
        GestureLabel::Fist,
        GestureLabel::OpenPalm,
        GestureLabel::Peace,
        GestureLabel::ThumbsUp,
        GestureLabel::PointingUp,
        GestureLabel::OneFinger,
        GestureLabel::TwoFingers,
        GestureLabel::ThreeFingers,
    ];

    /// Name used in configuration files and logs.
    pub fn name(self) -> &'static str {
        match self {
            GestureLabel::None => "none",
            GestureLabel::Fist => "fist",
            GestureLabel::OpenPalm => "open_palm",
            GestureLabel::Peace => "peace",
            GestureLabel::ThumbsUp => "thumbs_up",
            GestureLabel::PointingUp => "pointing_up",
            GestureLabel::OneFinger => "one_finger",
            GestureLabel::TwoFingers => "two_fingers",
            GestureLabel::ThreeFingers => "three_fingers",
        }
    }

    pub fn is_none(self) -> bool {
        self == GestureLabel::None
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GestureLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GestureLabel::ALL
            .iter()
            .copied()
            .find(|label| label.name() == s)
            .ok_or_else(|| format!("unknown gesture: {}", s))
    }
}

/// Which hand a detection belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HandSide {
    Left,
    Right,
    /// No hand was detected this frame.
    Unknown,
}

impl HandSide {
    pub fn name(self) -> &'static str {
        match self {
            HandSide::Left => "left",
            HandSide::Right => "right",
            HandSide::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extension state of each finger: thumb, index, middle, ring, pinky.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerVector(pub [bool; 5]);

impl FingerVector {
    pub const THUMB: usize = 0;
    pub const INDEX: usize = 1;
    pub const MIDDLE: usize = 2;

    pub fn new(thumb: bool, index: bool, middle: bool, ring: bool, pinky: bool) -> FingerVector {
        FingerVector([thumb, index, middle, ring, pinky])
    }

    /// Unpack from the low five bits of a byte, thumb first.
    pub fn from_bits(bits: u8) -> FingerVector {
        let mut fingers = [false; 5];
        for (i, finger) in fingers.iter_mut().enumerate() {
            *finger = bits & (1 << i) != 0;
        }
        FingerVector(fingers)
    }

    pub fn to_bits(self) -> u8 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |bits, (i, up)| if *up { bits | (1 << i) } else { bits })
    }

    /// Number of extended fingers.
    pub fn extended(self) -> usize {
        self.0.iter().filter(|up| **up).count()
    }

    fn only(self, finger: usize) -> bool {
        self.extended() == 1 && self.0[finger]
    }
}

/// Map a finger vector to a gesture.
///
/// Total over all 32 inputs. Four extended fingers has no gesture of its own
/// and classifies as `None`.
pub fn classify(fingers: FingerVector) -> GestureLabel {
    match fingers.extended() {
        0 => GestureLabel::Fist,
        1 if fingers.only(FingerVector::INDEX) => GestureLabel::PointingUp,
        1 if fingers.only(FingerVector::THUMB) => GestureLabel::ThumbsUp,
        1 => GestureLabel::OneFinger,
        2 if fingers.0[FingerVector::INDEX] && fingers.0[FingerVector::MIDDLE] => GestureLabel::Peace,
        2 => GestureLabel::TwoFingers,
        3 => GestureLabel::ThreeFingers,
        5 => GestureLabel::OpenPalm,
        _ => GestureLabel::None,
    }
}

/// A single hand reported by the detector.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedHand {
    pub side: HandSide,
    pub fingers: FingerVector,
}

impl DetectedHand {
    pub fn new(side: HandSide, fingers: FingerVector) -> DetectedHand {
        DetectedHand { side, fingers }
    }
}

/// Pick the frame's active gesture: the first hand, in detection order, that
/// shows something other than `None`.
pub fn select_active(hands: &[DetectedHand]) -> (GestureLabel, HandSide) {
    hands
        .iter()
        .map(|hand| (classify(hand.fingers), hand.side))
        .find(|(gesture, _)| !gesture.is_none())
        .unwrap_or((GestureLabel::None, HandSide::Unknown))
}
