use std::fmt;
use std::time::Instant;

/// Number of keypoints the hand landmark model emits per hand.
pub const NUM_LANDMARKS: usize = 21;

// MediaPipe-style landmark indices. Each fingertip sits two positions after
// the joint the extension heuristics compare against.
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// One captured image sample, tightly packed RGB.
///
/// Frames are consumed read-only by a single analysis pass and dropped
/// afterwards; nothing in the pipeline retains them.
#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgb: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgb,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

/// Keypoint output for one detected hand, as produced by the landmark model.
/// Coordinates are normalized; only relative ordering matters downstream.
#[derive(Clone, Debug)]
pub struct LandmarkSet {
    pub points: Vec<[f32; 3]>,
    pub handedness: Handedness,
}

/// Discrete classification of the dominant detected gesture. Exactly one
/// label is active at a time; the wire strings below are the push-channel
/// payloads and must stay stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureLabel {
    Waiting,
    ThumbsUp,
    LeftHand,
    RightHand,
    HandDetected,
}

impl GestureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Waiting => "waiting",
            GestureLabel::ThumbsUp => "thumbs_up",
            GestureLabel::LeftHand => "left_hand",
            GestureLabel::RightHand => "right_hand",
            GestureLabel::HandDetected => "hand_detected",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant-color summary of a frame region: a hex color, or one of the two
/// sentinels. `Unknown` means no frame/region was available, `Error` means
/// clustering failed. Gesture deliberately has no error sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorEstimate {
    Unknown,
    Error,
    Hex(String),
}

impl ColorEstimate {
    pub fn as_str(&self) -> &str {
        match self {
            ColorEstimate::Unknown => "unknown",
            ColorEstimate::Error => "error",
            ColorEstimate::Hex(hex) => hex,
        }
    }
}

impl fmt::Display for ColorEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
