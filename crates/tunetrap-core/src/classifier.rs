//! Trained emotion classifier via ONNX Runtime.
//!
//! Expects a Keras-style image classifier exported to ONNX: NHWC
//! `[1, 224, 224, 3]` input in [0, 1], softmax scores out. A missing or
//! unloadable model leaves the classifier degraded rather than failing.

use crate::types::{Label, Prediction, DEFAULT_LABELS};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const CLASSIFIER_INPUT_SIZE: u32 = 224;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Channel ordering the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Raw score producer: a batched input tensor in, one score per class out.
pub trait ScoreModel: Send {
    fn scores(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// ONNX Runtime session producing class scores.
pub struct OnnxScorer {
    session: Session,
}

impl OnnxScorer {
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        Ok(Self { session })
    }
}

impl ScoreModel for OnnxScorer {
    fn scores(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("class scores: {e}")))?;

        Ok(scores.to_vec())
    }
}

/// Emotion classifier over a cropped face image.
pub struct EmotionModel {
    scorer: Option<Box<dyn ScoreModel>>,
    labels: Vec<Label>,
    channel_order: ChannelOrder,
}

impl EmotionModel {
    /// Load the model at `model_path`. Never fails: any problem yields a
    /// degraded classifier that always predicts `(neutral, 0.0)`.
    pub fn load(model_path: Option<&Path>) -> Self {
        let scorer = match model_path {
            None => {
                tracing::warn!("no emotion model configured; classifier will report neutral");
                None
            }
            Some(path) => match OnnxScorer::load(path) {
                Ok(scorer) => Some(Box::new(scorer) as Box<dyn ScoreModel>),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "emotion model unavailable; classifier will report neutral"
                    );
                    None
                }
            },
        };

        Self {
            scorer,
            labels: DEFAULT_LABELS.to_vec(),
            channel_order: ChannelOrder::default(),
        }
    }

    /// Build a classifier around an already-constructed score model.
    pub fn with_scorer(scorer: Box<dyn ScoreModel>) -> Self {
        Self {
            scorer: Some(scorer),
            labels: DEFAULT_LABELS.to_vec(),
            channel_order: ChannelOrder::default(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<Label>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    /// Whether a model is loaded (false means every prediction is neutral).
    pub fn is_loaded(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn predict(&mut self, face: &RgbImage) -> Result<Prediction, ClassifierError> {
        let Some(scorer) = self.scorer.as_mut() else {
            return Ok(Prediction::neutral());
        };

        if face.width() == 0 || face.height() == 0 {
            return Ok(Prediction::neutral());
        }

        let input = preprocess(face, self.channel_order);
        let scores = scorer.scores(&input)?;
        decode_scores(&scores, &self.labels)
            .ok_or_else(|| ClassifierError::InferenceFailed("model returned no scores".into()))
    }
}

/// Resize, reorder channels, scale to [0, 1] and add the batch axis.
fn preprocess(face: &RgbImage, order: ChannelOrder) -> Array4<f32> {
    let resized = imageops::resize(
        face,
        CLASSIFIER_INPUT_SIZE,
        CLASSIFIER_INPUT_SIZE,
        FilterType::Triangle,
    );
    let size = CLASSIFIER_INPUT_SIZE as usize;

    Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
        let channel = match order {
            ChannelOrder::Rgb => c,
            ChannelOrder::Bgr => 2 - c,
        };
        resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0
    })
}

/// Arg-max over the scores. Indices past the label table become `Label::Class`.
fn decode_scores(scores: &[f32], labels: &[Label]) -> Option<Prediction> {
    let (idx, &prob) = scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, &f32)>, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })?;

    let label = labels.get(idx).copied().unwrap_or(Label::Class(idx));
    Some(Prediction::new(label, prob))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScores(Vec<f32>);

    impl ScoreModel for FixedScores {
        fn scores(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            assert_eq!(input.shape(), &[1, 224, 224, 3]);
            Ok(self.0.clone())
        }
    }

    /// Scores `[c0, 1 - c0]` from the first input channel of the top-left pixel.
    struct FirstChannel;

    impl ScoreModel for FirstChannel {
        fn scores(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
            let c0 = input[[0, 0, 0, 0]];
            Ok(vec![c0, 1.0 - c0])
        }
    }

    #[test]
    fn test_degraded_without_path() {
        let mut model = EmotionModel::load(None);
        assert!(!model.is_loaded());
        let face = RgbImage::from_pixel(80, 80, image::Rgb([200, 100, 50]));
        assert_eq!(model.predict(&face).unwrap(), Prediction::neutral());
    }

    #[test]
    fn test_degraded_with_missing_file() {
        let mut model = EmotionModel::load(Some(Path::new("/nonexistent/emotion.onnx")));
        assert!(!model.is_loaded());
        for size in [1, 17, 300] {
            let face = RgbImage::new(size, size);
            assert_eq!(model.predict(&face).unwrap(), Prediction::neutral());
        }
    }

    #[test]
    fn test_predict_argmax() {
        let scores = FixedScores(vec![0.05, 0.82, 0.05, 0.04, 0.04]);
        let mut model = EmotionModel::with_scorer(Box::new(scores));
        let p = model.predict(&RgbImage::new(120, 90)).unwrap();
        assert_eq!(p.label, Label::Happy);
        assert!((p.confidence - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_index_outside_table() {
        let scores = FixedScores(vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.4]);
        let mut model = EmotionModel::with_scorer(Box::new(scores));
        let p = model.predict(&RgbImage::new(64, 64)).unwrap();
        assert_eq!(p.label, Label::Class(6));
        assert_eq!(p.label.to_string(), "6");
    }

    #[test]
    fn test_decode_scores_tie_keeps_first() {
        let p = decode_scores(&[0.4, 0.4, 0.2], &DEFAULT_LABELS).unwrap();
        assert_eq!(p.label, Label::Neutral);
        assert!(decode_scores(&[], &DEFAULT_LABELS).is_none());
    }

    #[test]
    fn test_preprocess_channel_order() {
        let face = RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 0]));
        let rgb = preprocess(&face, ChannelOrder::Rgb);
        let bgr = preprocess(&face, ChannelOrder::Bgr);
        assert!((rgb[[0, 5, 5, 0]] - 1.0).abs() < 1e-2);
        assert!(rgb[[0, 5, 5, 2]].abs() < 1e-2);
        assert!(bgr[[0, 5, 5, 0]].abs() < 1e-2);
        assert!((bgr[[0, 5, 5, 2]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_custom_labels_and_bgr_order() {
        let red = RgbImage::from_pixel(32, 32, image::Rgb([255, 0, 0]));
        let labels = vec![Label::Angry, Label::Sad];

        let mut rgb = EmotionModel::with_scorer(Box::new(FirstChannel)).with_labels(labels.clone());
        assert_eq!(rgb.predict(&red).unwrap().label, Label::Angry);

        let mut bgr = EmotionModel::with_scorer(Box::new(FirstChannel))
            .with_labels(labels)
            .with_channel_order(ChannelOrder::Bgr);
        let p = bgr.predict(&red).unwrap();
        assert_eq!(p.label, Label::Sad);
        assert!((p.confidence - 1.0).abs() < 1e-2);
    }
}
