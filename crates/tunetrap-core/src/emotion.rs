//! Emotion detector facade.
//!
//! Picks one of two classification paths at construction and normalizes
//! both to a [`Classification`].

use crate::classifier::{ClassifierError, EmotionModel};
use crate::detector::{DetectorError, ScrfdDetector};
use crate::heuristic::LandmarkHeuristic;
use crate::locator::{FaceCandidates, FaceLocator};
use crate::mesh::{FaceMeshEstimator, LandmarkEstimator, MeshError};
use crate::types::Classification;
use image::{imageops, RgbImage};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown detector mode {0:?} (expected \"heuristic\" or \"model\")")]
    UnknownMode(String),
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("face locator: {0}")]
    Locator(#[from] DetectorError),
    #[error("face mesh: {0}")]
    Mesh(#[from] MeshError),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("{0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Which classification path the detector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorMode {
    /// Face-mesh landmarks + threshold rules over the whole frame.
    Heuristic,
    /// Largest face crop through the trained classifier.
    Model,
}

impl FromStr for DetectorMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(DetectorMode::Heuristic),
            "model" => Ok(DetectorMode::Model),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for DetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectorMode::Heuristic => "heuristic",
            DetectorMode::Model => "model",
        })
    }
}

/// Immutable detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    mode: DetectorMode,
    locator_model: PathBuf,
    mesh_model: PathBuf,
    emotion_model: Option<PathBuf>,
}

impl DetectorConfig {
    /// Validate `mode` and record model paths. An unknown mode is rejected here.
    pub fn new(
        mode: &str,
        locator_model: impl Into<PathBuf>,
        mesh_model: impl Into<PathBuf>,
        emotion_model: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            mode: mode.parse()?,
            locator_model: locator_model.into(),
            mesh_model: mesh_model.into(),
            emotion_model,
        })
    }

    pub fn mode(&self) -> DetectorMode {
        self.mode
    }
}

/// One classification path: frame in, normalized result out.
pub trait EmotionClassifier {
    fn classify(&mut self, frame: &RgbImage) -> Result<Classification, DetectError>;
}

/// Heuristic path. Works on the whole frame, so never reports a box.
pub struct HeuristicPath<E> {
    heuristic: LandmarkHeuristic<E>,
}

impl<E: LandmarkEstimator> HeuristicPath<E> {
    pub fn new(estimator: E) -> Self {
        Self {
            heuristic: LandmarkHeuristic::new(estimator),
        }
    }
}

impl<E: LandmarkEstimator> EmotionClassifier for HeuristicPath<E> {
    fn classify(&mut self, frame: &RgbImage) -> Result<Classification, DetectError> {
        let prediction = self
            .heuristic
            .predict(frame)
            .map_err(|e| DetectError::Backend(Box::new(e)))?;
        Ok(Classification::from_prediction(prediction, None))
    }
}

/// Trained-model path: locate the largest face, crop, classify.
pub struct ModelPath<C> {
    locator: FaceLocator<C>,
    model: EmotionModel,
}

impl<C: FaceCandidates> ModelPath<C> {
    pub fn new(locator: FaceLocator<C>, model: EmotionModel) -> Self {
        Self { locator, model }
    }
}

impl<C: FaceCandidates> EmotionClassifier for ModelPath<C> {
    fn classify(&mut self, frame: &RgbImage) -> Result<Classification, DetectError> {
        let face = self
            .locator
            .locate(frame)
            .map_err(|e| DetectError::Backend(Box::new(e)))?;

        let Some(face) = face else {
            return Ok(Classification::neutral());
        };

        let crop = imageops::crop_imm(frame, face.x, face.y, face.width, face.height).to_image();
        let prediction = self.model.predict(&crop)?;
        Ok(Classification::from_prediction(prediction, Some(face)))
    }
}

/// Emotion detector with its classification path fixed at construction.
pub struct EmotionDetector {
    mode: DetectorMode,
    inner: Box<dyn EmotionClassifier + Send>,
}

impl EmotionDetector {
    /// Load every resource the configured mode needs.
    ///
    /// The locator and mesh models are required; a missing emotion model
    /// only degrades the model path to neutral results.
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectError> {
        let locator = FaceLocator::new(ScrfdDetector::load(&config.locator_model)?);

        let inner: Box<dyn EmotionClassifier + Send> = match config.mode {
            DetectorMode::Heuristic => {
                let estimator = FaceMeshEstimator::load(&config.mesh_model, locator)?;
                Box::new(HeuristicPath::new(estimator))
            }
            DetectorMode::Model => {
                let model = EmotionModel::load(config.emotion_model.as_deref());
                Box::new(ModelPath::new(locator, model))
            }
        };

        tracing::info!(mode = %config.mode, "emotion detector ready");
        Ok(Self {
            mode: config.mode,
            inner,
        })
    }

    /// Wrap an already-built classification path.
    pub fn from_classifier(mode: DetectorMode, inner: Box<dyn EmotionClassifier + Send>) -> Self {
        Self { mode, inner }
    }

    pub fn mode(&self) -> DetectorMode {
        self.mode
    }

    pub fn detect(&mut self, frame: &RgbImage) -> Result<Classification, DetectError> {
        self.inner.classify(frame)
    }
}

impl EmotionClassifier for EmotionDetector {
    fn classify(&mut self, frame: &RgbImage) -> Result<Classification, DetectError> {
        self.detect(frame)
    }
}
