//! Anchor-free face detector via ONNX Runtime.
//!
//! The model predicts, per stride level, a score per anchor and a box as
//! four distances from the anchor center (in stride units). Decoding is
//! followed by greedy NMS and coordinate de-mapping from the letterboxed
//! input back to frame pixels.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use porteiro_core::{DetectError, FaceRegion};

const DET_INPUT_SIZE: usize = 640;
const DET_MEAN: f32 = 127.5;
const DET_STD: f32 = 128.0;
const DET_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DET_NMS_IOU: f32 = 0.4;
const DET_STRIDES: [usize; 3] = [8, 16, 32];
const DET_ANCHORS_PER_CELL: usize = 2;

/// Metadata for mapping letterboxed coordinates back to the frame.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    /// Fit `width` x `height` into a square of `target`, centered.
    fn fit(width: usize, height: usize, target: usize) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let pad_x = (target as f32 - width as f32 * scale) / 2.0;
        let pad_y = (target as f32 - height as f32 * scale) / 2.0;
        Self { scale, pad_x, pad_y }
    }

    fn unmap_x(&self, x: f32) -> f32 {
        (x - self.pad_x) / self.scale
    }

    fn unmap_y(&self, y: f32) -> f32 {
        (y - self.pad_y) / self.scale
    }
}

/// ONNX face detector.
pub struct FaceFinder {
    session: Session,
}

impl FaceFinder {
    /// Load the detection model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectError> {
        if !Path::new(model_path).exists() {
            return Err(DetectError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(2))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;

        let num_outputs = session.outputs().len();
        tracing::info!(path = model_path, outputs = num_outputs, "loaded detection model");

        // Score and box tensors per stride, positional ordering:
        // [score_8, score_16, score_32, bbox_8, bbox_16, bbox_32, ...].
        if num_outputs < 2 * DET_STRIDES.len() {
            return Err(DetectError::InferenceFailed(format!(
                "detection model needs {} outputs (score+box per stride), got {num_outputs}",
                2 * DET_STRIDES.len()
            )));
        }

        Ok(Self { session })
    }

    /// Detect faces in a grayscale frame, highest confidence first.
    pub fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, DetectError> {
        let w = width as usize;
        let h = height as usize;
        let expected = w * h;
        if gray.len() < expected {
            return Err(DetectError::BadFrame {
                expected,
                actual: gray.len(),
            });
        }

        let (input, letterbox) = preprocess(gray, w, h);

        let input_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_ref])
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;

        let mut detections = Vec::new();

        for (level, &stride) in DET_STRIDES.iter().enumerate() {
            let (_, scores) = outputs[level]
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    DetectError::InferenceFailed(format!("scores stride {stride}: {e}"))
                })?;
            let (_, deltas) = outputs[level + DET_STRIDES.len()]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            detections.extend(decode_stride(
                scores,
                deltas,
                stride,
                DET_INPUT_SIZE,
                DET_CONFIDENCE_THRESHOLD,
            ));
        }

        let mut kept = nms(detections, DET_NMS_IOU);

        // De-map from letterboxed input coordinates to frame pixels and
        // clamp to frame bounds.
        for r in &mut kept {
            let x1 = letterbox.unmap_x(r.x).clamp(0.0, w as f32);
            let y1 = letterbox.unmap_y(r.y).clamp(0.0, h as f32);
            let x2 = letterbox.unmap_x(r.x + r.width).clamp(0.0, w as f32);
            let y2 = letterbox.unmap_y(r.y + r.height).clamp(0.0, h as f32);
            r.x = x1;
            r.y = y1;
            r.width = (x2 - x1).max(0.0);
            r.height = (y2 - y1).max(0.0);
        }
        kept.retain(|r| r.width > 1.0 && r.height > 1.0);

        tracing::debug!(faces = kept.len(), "detection complete");
        Ok(kept)
    }
}

/// Letterbox a grayscale frame into a normalized NCHW tensor, replicating
/// the single channel to RGB.
fn preprocess(gray: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
    let size = DET_INPUT_SIZE;
    let letterbox = Letterbox::fit(width, height, size);
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for ty in 0..size {
        for tx in 0..size {
            // Nearest-neighbor sample from the source frame; padding
            // stays at the zero the tensor was initialized with.
            let sx = ((tx as f32 - letterbox.pad_x) / letterbox.scale) as isize;
            let sy = ((ty as f32 - letterbox.pad_y) / letterbox.scale) as isize;
            if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                continue;
            }
            let pixel = gray[sy as usize * width + sx as usize] as f32;
            let normalized = (pixel - DET_MEAN) / DET_STD;
            tensor[[0, 0, ty, tx]] = normalized;
            tensor[[0, 1, ty, tx]] = normalized;
            tensor[[0, 2, ty, tx]] = normalized;
        }
    }

    (tensor, letterbox)
}

/// Decode one stride level: scores are flat per anchor, boxes are four
/// center-relative distances in stride units.
fn decode_stride(
    scores: &[f32],
    deltas: &[f32],
    stride: usize,
    input_size: usize,
    confidence_threshold: f32,
) -> Vec<FaceRegion> {
    let grid = input_size / stride;
    let anchors = grid * grid * DET_ANCHORS_PER_CELL;
    let mut out = Vec::new();

    for idx in 0..anchors.min(scores.len()) {
        let score = scores[idx];
        if score < confidence_threshold {
            continue;
        }
        if deltas.len() < (idx + 1) * 4 {
            break;
        }

        let cell = idx / DET_ANCHORS_PER_CELL;
        let cx = (cell % grid * stride) as f32;
        let cy = (cell / grid * stride) as f32;

        let s = stride as f32;
        let left = deltas[idx * 4] * s;
        let top = deltas[idx * 4 + 1] * s;
        let right = deltas[idx * 4 + 2] * s;
        let bottom = deltas[idx * 4 + 3] * s;

        out.push(FaceRegion {
            x: cx - left,
            y: cy - top,
            width: left + right,
            height: top + bottom,
            confidence: score,
        });
    }

    out
}

/// Intersection-over-union of two regions.
fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression, highest confidence first.
fn nms(mut detections: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceRegion> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}
