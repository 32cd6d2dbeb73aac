//! Draw classification results onto frames.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing;
use imageproc::rect::Rect;
use std::path::Path;
use tunetrap_core::{Classification, FaceBox};

const BOX_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_ORIGIN: (i32, i32) = (10, 10);
const TEXT_SCALE: f32 = 28.0;

/// `label (confidence)` with two decimals, e.g. `happy (0.82)`.
pub fn caption(result: &Classification) -> String {
    format!("{} ({:.2})", result.label, result.confidence)
}

pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    /// Load the caption font. Without one, only face boxes are drawn.
    pub fn new(font_path: Option<&Path>) -> Self {
        let mut annotator = Self::without_text();
        annotator.font = font_path.and_then(load_font);
        annotator
    }

    pub fn without_text() -> Self {
        Self {
            font: None,
            scale: PxScale::from(TEXT_SCALE),
        }
    }

    pub fn annotate(&self, frame: &mut RgbImage, result: &Classification) {
        if let Some(face) = result.face {
            draw_face_box(frame, face);
        }
        if let Some(font) = &self.font {
            drawing::draw_text_mut(
                frame,
                TEXT_COLOUR,
                TEXT_ORIGIN.0,
                TEXT_ORIGIN.1,
                self.scale,
                font,
                &caption(result),
            );
        }
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "cannot read font, captions disabled"
            );
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => {
            tracing::debug!(path = %path.display(), "loaded caption font");
            Some(font)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid font, captions disabled");
            None
        }
    }
}

/// Two-pixel rectangle around the face.
fn draw_face_box(frame: &mut RgbImage, face: FaceBox) {
    if face.width == 0 || face.height == 0 {
        return;
    }
    let outer = Rect::at(face.x as i32, face.y as i32).of_size(face.width, face.height);
    drawing::draw_hollow_rect_mut(frame, outer, BOX_COLOUR);

    if face.width > 2 && face.height > 2 {
        let inner = Rect::at(face.x as i32 + 1, face.y as i32 + 1)
            .of_size(face.width - 2, face.height - 2);
        drawing::draw_hollow_rect_mut(frame, inner, BOX_COLOUR);
    }
}
