//! Face locator: picks the single largest face in a frame.

use crate::types::{BoundingBox, FaceBox};
use image::{imageops, GrayImage, RgbImage};

/// Smallest face side, in pixels, the locator accepts.
pub const MIN_FACE_SIZE: u32 = 60;

/// A source of face candidate boxes over a single-channel frame.
pub trait FaceCandidates {
    type Error: std::error::Error + Send + Sync + 'static;

    fn candidates(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, Self::Error>;
}

/// Finds the largest face bounding box in a colour frame.
pub struct FaceLocator<C> {
    candidates: C,
    min_size: u32,
}

impl<C: FaceCandidates> FaceLocator<C> {
    pub fn new(candidates: C) -> Self {
        Self {
            candidates,
            min_size: MIN_FACE_SIZE,
        }
    }

    pub fn with_min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }

    /// Locate the largest face, or `None` when no candidate survives.
    pub fn locate(&mut self, frame: &RgbImage) -> Result<Option<FaceBox>, C::Error> {
        let gray = imageops::grayscale(frame);
        let candidates = self.candidates.candidates(&gray)?;
        tracing::trace!(count = candidates.len(), "face candidates");

        let boxes = candidates
            .iter()
            .filter_map(|c| c.to_face_box(frame.width(), frame.height()))
            .filter(|b| b.width >= self.min_size && b.height >= self.min_size);

        Ok(largest(boxes))
    }
}

/// Largest box by area; on equal areas the earliest one wins.
fn largest(boxes: impl Iterator<Item = FaceBox>) -> Option<FaceBox> {
    boxes.fold(None, |best: Option<FaceBox>, b| match best {
        Some(prev) if prev.area() >= b.area() => Some(prev),
        _ => Some(b),
    })
}
