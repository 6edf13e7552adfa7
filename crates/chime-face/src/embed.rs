//! ArcFace embedding extraction via ONNX Runtime.
//!
//! Crops the detected box with a margin, resizes to the 112×112 model
//! input, and L2-normalizes the resulting 512-dim embedding so cosine
//! distance downstream is well-behaved.

use crate::raster;
use crate::FaceError;
use chime_core::{FaceEncoding, FaceRegion};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

const INPUT_SIZE: usize = 112;
// ArcFace symmetric normalization — std is 127.5, not 128.
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;
/// Extra context around the detected box, as a fraction of its size.
const CROP_MARGIN: f32 = 0.25;

/// ArcFace-based embedding extractor.
pub struct Embedder {
    session: Session,
}

impl Embedder {
    pub fn load(model_path: &std::path::Path) -> Result<Self, FaceError> {
        if !model_path.exists() {
            return Err(FaceError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "embedding model loaded");
        Ok(Self { session })
    }

    /// Extract an embedding for one detected face region.
    pub fn embed(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        region: &FaceRegion,
    ) -> Result<FaceEncoding, FaceError> {
        let crop = square_crop(frame, width as usize, height as usize, region);
        let input = to_tensor(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| FaceError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(FaceError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(FaceEncoding::new(l2_normalize(raw)))
    }
}

/// Cut a square window around the region center, padded by
/// [`CROP_MARGIN`], and resize it to the model input size. Out-of-frame
/// pixels are zero-filled.
fn square_crop(frame: &[u8], width: usize, height: usize, region: &FaceRegion) -> Vec<u8> {
    let side = region.width.max(region.height) * (1.0 + 2.0 * CROP_MARGIN);
    let cx = region.x + region.width / 2.0;
    let cy = region.y + region.height / 2.0;

    let x0 = (cx - side / 2.0).round() as i32;
    let y0 = (cy - side / 2.0).round() as i32;
    let side_px = (side.round() as usize).max(1);

    let window = raster::crop(frame, width, height, x0, y0, side_px, side_px);
    raster::resize_bilinear(&window, side_px, side_px, INPUT_SIZE, INPUT_SIZE)
}

/// 112×112 grayscale crop → normalized NCHW tensor, luma replicated
/// across three channels.
fn to_tensor(crop: &[u8]) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = crop.get(y * INPUT_SIZE + x).copied().unwrap_or(0) as f32;
            let value = (pixel - PIXEL_MEAN) / PIXEL_STD;
            for c in 0..3 {
                tensor[[0, c, y, x]] = value;
            }
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_tensor_shape_and_channels() {
        let crop = vec![200u8; INPUT_SIZE * INPUT_SIZE];
        let tensor = to_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 3, INPUT_SIZE, INPUT_SIZE]);
        // Gray replication: all channels identical.
        assert_eq!(tensor[[0, 0, 10, 10]], tensor[[0, 1, 10, 10]]);
        assert_eq!(tensor[[0, 1, 10, 10]], tensor[[0, 2, 10, 10]]);
    }

    #[test]
    fn test_to_tensor_normalization() {
        let crop = vec![255u8; INPUT_SIZE * INPUT_SIZE];
        let tensor = to_tensor(&crop);
        let expected = (255.0 - PIXEL_MEAN) / PIXEL_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let out = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((out[0] - 0.6).abs() < 1e-6);
        assert!((out[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_square_crop_is_model_sized() {
        let frame = vec![128u8; 64 * 64];
        let region = FaceRegion {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 30.0,
            confidence: 0.9,
        };
        let crop = square_crop(&frame, 64, 64, &region);
        assert_eq!(crop.len(), INPUT_SIZE * INPUT_SIZE);
    }

    #[test]
    fn test_square_crop_handles_edge_region() {
        // Region hanging off the frame edge must not panic.
        let frame = vec![128u8; 32 * 32];
        let region = FaceRegion {
            x: -5.0,
            y: 28.0,
            width: 20.0,
            height: 20.0,
            confidence: 0.9,
        };
        let crop = square_crop(&frame, 32, 32, &region);
        assert_eq!(crop.len(), INPUT_SIZE * INPUT_SIZE);
    }
}
