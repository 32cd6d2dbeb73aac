use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw face candidate from the SCRFD detector, in frame coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Round onto the pixel grid and clamp to a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn to_face_box(&self, frame_width: u32, frame_height: u32) -> Option<FaceBox> {
        let x1 = self.x.round().clamp(0.0, frame_width as f32) as u32;
        let y1 = self.y.round().clamp(0.0, frame_height as f32) as u32;
        let x2 = (self.x + self.width).round().clamp(0.0, frame_width as f32) as u32;
        let y2 = (self.y + self.height).round().clamp(0.0, frame_height as f32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// Integer face rectangle, valid only for the frame it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Emotion label produced by either classification path.
///
/// `Class` only appears when a trained model reports an index outside
/// the label table; it displays as the bare index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Neutral,
    Happy,
    Sad,
    Surprise,
    Angry,
    Class(usize),
}

/// Label table order used by the trained classifier.
pub const DEFAULT_LABELS: [Label; 5] = [
    Label::Neutral,
    Label::Happy,
    Label::Sad,
    Label::Surprise,
    Label::Angry,
];

impl Label {
    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        match self {
            Label::Neutral => "neutral".into(),
            Label::Happy => "happy".into(),
            Label::Sad => "sad".into(),
            Label::Surprise => "surprise".into(),
            Label::Angry => "angry".into(),
            Label::Class(idx) => idx.to_string().into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown emotion label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for Label {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Label::Neutral),
            "happy" => Ok(Label::Happy),
            "sad" => Ok(Label::Sad),
            "surprise" => Ok(Label::Surprise),
            "angry" => Ok(Label::Angry),
            other => other
                .parse::<usize>()
                .map(Label::Class)
                .map_err(|_| UnknownLabel(s.to_string())),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Label plus a confidence in the producing classifier's own scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f32,
}

impl Prediction {
    pub const fn new(label: Label, confidence: f32) -> Self {
        Self { label, confidence }
    }

    /// The "nothing to report" result: no face, or no model loaded.
    pub const fn neutral() -> Self {
        Self::new(Label::Neutral, 0.0)
    }
}

/// Normalized output of every classification path.
///
/// Heuristic confidences are geometric ratios; trained-model confidences
/// are softmax probabilities. They are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub label: Label,
    pub confidence: f32,
    pub face: Option<FaceBox>,
}

impl Classification {
    pub fn from_prediction(prediction: Prediction, face: Option<FaceBox>) -> Self {
        Self {
            label: prediction.label,
            confidence: prediction.confidence,
            face,
        }
    }

    pub fn neutral() -> Self {
        Self::from_prediction(Prediction::neutral(), None)
    }
}

/// Face-mesh landmarks in frame pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct LandmarkSet {
    points: Vec<(f32, f32)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(f32, f32)>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<(f32, f32)> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
