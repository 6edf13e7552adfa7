//! SCRFD face detection via ONNX Runtime.
//!
//! Anchor-free decode over three stride levels with NMS. Landmark
//! outputs are ignored — the embedder works from the bounding box
//! alone.

use crate::raster;
use crate::FaceError;
use chime_core::FaceRegion;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const IOU_LIMIT: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// How letterboxed model coordinates map back to frame coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// SCRFD-based face detector.
pub struct Detector {
    session: Session,
}

impl Detector {
    pub fn load(model_path: &std::path::Path) -> Result<Self, FaceError> {
        if !model_path.exists() {
            return Err(FaceError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = %model_path.display(),
            outputs = num_outputs,
            "detection model loaded"
        );

        // 3 strides × (score, bbox) minimum; models also ship kps
        // tensors, which we ignore.
        if num_outputs < 6 {
            return Err(FaceError::InferenceFailed(format!(
                "detection model needs at least 6 outputs (3 strides × score/bbox), got {num_outputs}"
            )));
        }

        Ok(Self { session })
    }

    /// Detect faces in a grayscale frame. Returns regions in frame
    /// coordinates, sorted by confidence descending. Zero faces is an
    /// empty vec, not an error.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, FaceError> {
        let (input, letterbox) = letterbox_tensor(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        // Standard SCRFD export layout: [0-2] scores, [3-5] bboxes,
        // [6-8] kps, each ordered by stride 8/16/32.
        for (i, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[i]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[i + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            decode_stride(scores, boxes, stride, &letterbox, &mut candidates);
        }

        let mut regions = suppress(candidates);
        regions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(regions)
    }
}

/// Letterbox the frame into a normalized 640×640 NCHW tensor, gray
/// replicated across three channels. Padding normalizes to 0.
fn letterbox_tensor(frame: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
    let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as usize).min(INPUT_SIZE);
    let new_h = ((height as f32 * scale).round() as usize).min(INPUT_SIZE);

    let resized = raster::resize_bilinear(frame, width, height, new_w, new_h);

    let pad_x = (INPUT_SIZE - new_w) / 2;
    let pad_y = (INPUT_SIZE - new_h) / 2;

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..new_h {
        for x in 0..new_w {
            let value = (resized[y * new_w + x] as f32 - PIXEL_MEAN) / PIXEL_STD;
            for c in 0..3 {
                tensor[[0, c, y + pad_y, x + pad_x]] = value;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Decode one stride level: anchor centers on a `stride`-spaced grid,
/// box tensor holds left/top/right/bottom distances in stride units.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<FaceRegion>,
) {
    let grid = INPUT_SIZE / stride;
    let anchors = grid * grid * ANCHORS_PER_CELL;
    let s = stride as f32;

    for idx in 0..anchors {
        let confidence = scores.get(idx).copied().unwrap_or(0.0);
        if confidence <= SCORE_THRESHOLD {
            continue;
        }
        let Some(dist) = boxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_x = (cell % grid) as f32 * s;
        let anchor_y = (cell / grid) as f32 * s;

        let x1 = (anchor_x - dist[0] * s - letterbox.pad_x) / letterbox.scale;
        let y1 = (anchor_y - dist[1] * s - letterbox.pad_y) / letterbox.scale;
        let x2 = (anchor_x + dist[2] * s - letterbox.pad_x) / letterbox.scale;
        let y2 = (anchor_y + dist[3] * s - letterbox.pad_y) / letterbox.scale;

        out.push(FaceRegion {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
        });
    }
}

/// Non-maximum suppression over the pooled candidates.
fn suppress(mut candidates: Vec<FaceRegion>) -> Vec<FaceRegion> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceRegion> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(k, &candidate) <= IOU_LIMIT) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let overlap = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - overlap;
    if union > 0.0 {
        overlap / union
    } else {
        0.0
    }
}
