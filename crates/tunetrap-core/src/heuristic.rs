//! Landmark heuristic classifier.
//!
//! Five fixed threshold rules over three face-geometry ratios. The
//! confidences are the ratios themselves, not probabilities.

use crate::mesh::LandmarkEstimator;
use crate::types::{Label, LandmarkSet, Prediction};
use image::RgbImage;

/// Face-mesh indices of the landmarks the rules read.
pub mod indices {
    pub const UPPER_LIP: usize = 13;
    pub const LOWER_LIP: usize = 14;
    pub const LEFT_EYE_UPPER: usize = 159;
    pub const LEFT_EYE_LOWER: usize = 145;
    pub const BROW_INNER: usize = 10;
    pub const BROW_OUTER: usize = 338;
}

const SURPRISE_MOUTH_OPEN: f32 = 0.035;
const ANGRY_EYE_OPEN_MAX: f32 = 0.007;
const ANGRY_BROW_DIST_MIN: f32 = 0.02;
const HAPPY_MOUTH_OPEN: f32 = 0.02;
const HAPPY_EYE_OPEN_MIN: f32 = 0.008;
/// Neutral confidence is a fixed constant, not derived from any ratio.
const NEUTRAL_CONFIDENCE: f32 = 0.35;

/// The six landmark positions the rules need, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicPoints {
    pub upper_lip: (f32, f32),
    pub lower_lip: (f32, f32),
    pub eye_upper: (f32, f32),
    pub eye_lower: (f32, f32),
    pub brow_inner: (f32, f32),
    pub brow_outer: (f32, f32),
}

impl HeuristicPoints {
    /// Pick the named points out of a full mesh, truncated to whole pixels.
    /// `None` if the mesh is short.
    pub fn from_landmarks(set: &LandmarkSet) -> Option<Self> {
        let pixel = |idx: usize| set.get(idx).map(|(x, y)| (x.trunc(), y.trunc()));
        Some(Self {
            upper_lip: pixel(indices::UPPER_LIP)?,
            lower_lip: pixel(indices::LOWER_LIP)?,
            eye_upper: pixel(indices::LEFT_EYE_UPPER)?,
            eye_lower: pixel(indices::LEFT_EYE_LOWER)?,
            brow_inner: pixel(indices::BROW_INNER)?,
            brow_outer: pixel(indices::BROW_OUTER)?,
        })
    }
}

/// Geometry ratios normalized by frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRatios {
    pub mouth_open: f32,
    pub eye_open: f32,
    pub brow_dist: f32,
}

impl FaceRatios {
    pub fn measure(points: &HeuristicPoints, width: u32, height: u32) -> Self {
        let h = height.max(1) as f32;
        let w = width.max(1) as f32;
        Self {
            mouth_open: distance(points.upper_lip, points.lower_lip) / h,
            eye_open: distance(points.eye_upper, points.eye_lower) / h,
            brow_dist: distance(points.brow_inner, points.brow_outer) / w,
        }
    }

    /// Apply the rules in priority order; the first match wins.
    pub fn classify(&self) -> Prediction {
        if self.mouth_open > SURPRISE_MOUTH_OPEN {
            return Prediction::new(Label::Surprise, self.mouth_open);
        }
        if self.eye_open < ANGRY_EYE_OPEN_MAX && self.brow_dist > ANGRY_BROW_DIST_MIN {
            return Prediction::new(Label::Angry, 1.0 - self.eye_open);
        }
        if self.mouth_open > HAPPY_MOUTH_OPEN && self.eye_open > HAPPY_EYE_OPEN_MIN {
            return Prediction::new(Label::Happy, self.mouth_open);
        }
        Prediction::new(Label::Neutral, NEUTRAL_CONFIDENCE)
    }
}

/// Pure rule evaluation over six landmark positions and the frame size.
pub fn classify_landmarks(points: &HeuristicPoints, width: u32, height: u32) -> Prediction {
    let ratios = FaceRatios::measure(points, width, height);
    let prediction = ratios.classify();
    tracing::trace!(
        mouth_open = ratios.mouth_open,
        eye_open = ratios.eye_open,
        brow_dist = ratios.brow_dist,
        label = %prediction.label,
        "heuristic ratios"
    );
    prediction
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Whole-frame heuristic classifier over a landmark estimator.
pub struct LandmarkHeuristic<E> {
    estimator: E,
}

impl<E: LandmarkEstimator> LandmarkHeuristic<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    /// Classify a frame. No face (or a truncated mesh) is `(neutral, 0.0)`.
    pub fn predict(&mut self, frame: &RgbImage) -> Result<Prediction, E::Error> {
        let points = self
            .estimator
            .estimate(frame)?
            .as_ref()
            .and_then(HeuristicPoints::from_landmarks);

        Ok(match points {
            Some(points) => classify_landmarks(&points, frame.width(), frame.height()),
            None => Prediction::neutral(),
        })
    }
}
