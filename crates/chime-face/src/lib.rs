//! chime-face — Production biometrics provider.
//!
//! Face detection (SCRFD) and embedding extraction (ArcFace) via ONNX
//! Runtime, wired together behind the [`chime_core::Biometrics`]
//! adapter contract. All inference is local CPU work with bounded
//! intra-op threads; nothing here can hang on the network.

pub mod detect;
pub mod embed;
mod raster;

use chime_core::{Biometrics, BiometricsError, FaceEncoding, FaceRegion};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Detection model filename expected under the model directory.
pub const DETECT_MODEL_FILE: &str = "det_10g.onnx";
/// Embedding model filename expected under the model directory.
pub const EMBED_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("model file not found: {0} (download from insightface and place in the model dir)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Default model location: `$XDG_DATA_HOME/chime/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("chime")
        .join("models")
}

/// Detector + embedder pair implementing the biometric adapter
/// contract for the dispatch loop.
pub struct FaceEngine {
    detector: detect::Detector,
    embedder: embed::Embedder,
}

impl FaceEngine {
    /// Load both models from `model_dir`. Fails fast if either file is
    /// missing or malformed.
    pub fn load(model_dir: &Path) -> Result<Self, FaceError> {
        let detector = detect::Detector::load(&model_dir.join(DETECT_MODEL_FILE))?;
        let embedder = embed::Embedder::load(&model_dir.join(EMBED_MODEL_FILE))?;
        Ok(Self { detector, embedder })
    }
}

impl Biometrics for FaceEngine {
    fn locate(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, BiometricsError> {
        self.detector
            .detect(frame, width, height)
            .map_err(|e| BiometricsError::DetectionFailed(e.to_string()))
    }

    fn encode(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, BiometricsError> {
        regions
            .iter()
            .map(|region| {
                self.embedder
                    .embed(frame, width, height, region)
                    .map_err(|e| BiometricsError::EncodingFailed(e.to_string()))
            })
            .collect()
    }
}
