use std::path::{Path, PathBuf};
use tunetrap_core::{EMOTION_MODEL_FILE, LOCATOR_MODEL_FILE, MESH_MODEL_FILE};

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// "heuristic" or "model". Validated when the detector is built.
    pub detector_mode: String,
    /// Trained classifier; a missing file degrades the model path to neutral.
    pub emotion_model: PathBuf,
    /// Classify every Nth frame.
    pub frame_skip: u64,
    pub youtube_api_key: Option<String>,
    pub max_results: usize,
    /// TrueType font for frame labels. No font, no text.
    pub font_path: Option<PathBuf>,
    /// Replacement fallback table (TOML).
    pub fallback_table: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `TUNETRAP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("TUNETRAP_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./models"));

        let emotion_model = var("TUNETRAP_EMOTION_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|| model_dir.join(EMOTION_MODEL_FILE));

        let font_path = var("TUNETRAP_FONT_PATH").map(PathBuf::from).or_else(|| {
            FONT_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
        });

        Self {
            camera_device: var("TUNETRAP_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir,
            detector_mode: var("TUNETRAP_DETECTOR_MODE").unwrap_or_else(|| "heuristic".to_string()),
            emotion_model,
            frame_skip: parse_or(var("TUNETRAP_FRAME_SKIP"), 2),
            youtube_api_key: var("TUNETRAP_YOUTUBE_API_KEY").filter(|k| !k.trim().is_empty()),
            max_results: parse_or(var("TUNETRAP_MAX_RESULTS"), tunetrap_music::DEFAULT_MAX_RESULTS),
            font_path,
            fallback_table: var("TUNETRAP_FALLBACK_TABLE").map(PathBuf::from),
        }
    }

    /// Path to the SCRFD face locator model.
    pub fn locator_model_path(&self) -> PathBuf {
        self.model_dir.join(LOCATOR_MODEL_FILE)
    }

    /// Path to the face mesh model.
    pub fn mesh_model_path(&self) -> PathBuf {
        self.model_dir.join(MESH_MODEL_FILE)
    }

    pub fn emotion_model_path(&self) -> &Path {
        &self.emotion_model
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
