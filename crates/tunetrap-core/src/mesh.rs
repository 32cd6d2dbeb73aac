//! MediaPipe face-mesh landmark estimation via ONNX Runtime.
//!
//! The largest face found by the [`FaceLocator`] is expanded to a square
//! region, resized to the 192×192 model input, and the 468 mesh points are
//! mapped back into frame pixel coordinates.

use crate::detector::{DetectorError, ScrfdDetector};
use crate::locator::FaceLocator;
use crate::types::{FaceBox, LandmarkSet};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const MESH_INPUT_SIZE: u32 = 192;
const MESH_POINTS: usize = 468;
/// Face box side multiplier when building the mesh region of interest.
const MESH_ROI_SCALE: f32 = 1.5;
const MESH_PRESENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("model file not found: {0}: export MediaPipe face_landmark to ONNX and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face locator: {0}")]
    Locator(#[from] DetectorError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces a landmark set for the dominant face in a frame, if any.
pub trait LandmarkEstimator {
    type Error: std::error::Error + Send + Sync + 'static;

    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>, Self::Error>;
}

/// Output tensor indices: (mesh_idx, presence_idx).
type MeshOutputIndices = (usize, Option<usize>);

/// Face-mesh estimator backed by SCRFD for ROI and MediaPipe for landmarks.
pub struct FaceMeshEstimator {
    locator: FaceLocator<ScrfdDetector>,
    session: Session,
    outputs: MeshOutputIndices,
}

impl FaceMeshEstimator {
    pub fn load(mesh_model: &Path, locator: FaceLocator<ScrfdDetector>) -> Result<Self, MeshError> {
        if !mesh_model.exists() {
            return Err(MeshError::ModelNotFound(mesh_model.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(mesh_model)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        let outputs = discover_output_indices(&output_names);

        tracing::info!(
            path = %mesh_model.display(),
            outputs = ?output_names,
            mapping = ?outputs,
            "loaded face mesh model"
        );

        Ok(Self { locator, session, outputs })
    }
}

impl LandmarkEstimator for FaceMeshEstimator {
    type Error = MeshError;

    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<LandmarkSet>, MeshError> {
        let Some(face) = self.locator.locate(frame)? else {
            return Ok(None);
        };

        let roi = face_roi(face, frame.width(), frame.height());
        let crop = imageops::crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image();
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (mesh_idx, presence_idx) = self.outputs;
        if let Some(idx) = presence_idx {
            let (_, logit) = outputs[idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| MeshError::InferenceFailed(format!("face presence: {e}")))?;
            let presence = logit.first().copied().map(sigmoid).unwrap_or(0.0);
            if presence < MESH_PRESENCE_THRESHOLD {
                tracing::trace!(presence, "face mesh rejected region");
                return Ok(None);
            }
        }

        let (_, raw) = outputs[mesh_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| MeshError::InferenceFailed(format!("landmarks: {e}")))?;

        if raw.len() < MESH_POINTS * 3 {
            return Err(MeshError::InferenceFailed(format!(
                "expected {} landmark values, got {}",
                MESH_POINTS * 3,
                raw.len()
            )));
        }

        Ok(Some(map_mesh(raw, roi)))
    }
}

/// Square region of `MESH_ROI_SCALE` × the larger face side, centred on the
/// face and clamped to the frame.
fn face_roi(face: FaceBox, frame_width: u32, frame_height: u32) -> FaceBox {
    let side = (face.width.max(face.height) as f32 * MESH_ROI_SCALE).round();
    let cx = face.x as f32 + face.width as f32 / 2.0;
    let cy = face.y as f32 + face.height as f32 / 2.0;

    let x1 = (cx - side / 2.0).max(0.0) as u32;
    let y1 = (cy - side / 2.0).max(0.0) as u32;
    let x2 = ((cx + side / 2.0) as u32).min(frame_width);
    let y2 = ((cy + side / 2.0) as u32).min(frame_height);

    FaceBox {
        x: x1,
        y: y1,
        width: x2.saturating_sub(x1).max(1),
        height: y2.saturating_sub(y1).max(1),
    }
}

/// Resize the ROI crop to NHWC `[1, 192, 192, 3]` in [0, 1].
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(crop, MESH_INPUT_SIZE, MESH_INPUT_SIZE, FilterType::Triangle);
    let size = MESH_INPUT_SIZE as usize;
    Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
    })
}

/// Map model-space (x, y, z) triples back into frame pixels.
fn map_mesh(raw: &[f32], roi: FaceBox) -> LandmarkSet {
    let x_scale = roi.width as f32 / MESH_INPUT_SIZE as f32;
    let y_scale = roi.height as f32 / MESH_INPUT_SIZE as f32;

    let points = raw
        .chunks_exact(3)
        .take(MESH_POINTS)
        .map(|p| (roi.x as f32 + p[0] * x_scale, roi.y as f32 + p[1] * y_scale))
        .collect();

    LandmarkSet::new(points)
}

/// Find landmark and face-presence outputs by name, else by position.
fn discover_output_indices(names: &[String]) -> MeshOutputIndices {
    let find = |keys: &[&str]| {
        names
            .iter()
            .position(|n| keys.iter().any(|k| n.to_ascii_lowercase().contains(k)))
    };

    let mesh = find(&["landmark", "conv2d_21"]);
    let presence = find(&["presence", "flag", "score", "conv2d_31"]);

    match mesh {
        Some(mesh_idx) => (mesh_idx, presence.filter(|&p| p != mesh_idx)),
        None => (0, (names.len() > 1).then_some(1)),
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
