//! The biometric adapter contract.
//!
//! Wraps whatever actually finds and embeds faces (ONNX models in
//! production, hand-written fakes in tests) behind a stable interface
//! the dispatch loop and the match policy can depend on.

use crate::types::{FaceEncoding, FaceRegion};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BiometricsError {
    /// Face detection itself failed (model error, bad frame geometry).
    /// Distinct from "zero faces found", which is an empty region list.
    #[error("detection failed: {0}")]
    DetectionFailed(String),
    /// Embedding extraction failed for a detected region.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

/// Face detection and embedding extraction over grayscale frames.
///
/// Contract:
/// - `locate` returns an empty list when no face is present — never an
///   error for that case.
/// - `encode` returns one encoding per input region, in the same order.
/// - Any internal computation failure surfaces as a [`BiometricsError`]
///   so the caller can degrade to "no identifiable face" instead of
///   crashing the loop.
pub trait Biometrics {
    fn locate(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, BiometricsError>;

    fn encode(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, BiometricsError>;
}
