//! Signature extraction via ONNX Runtime.
//!
//! Each detected face is cropped with a margin, resized to the network's
//! 112x112 input, and embedded. The raw embedding is L2-normalized and
//! widened to the f64 signature the matcher and store operate on.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use porteiro_core::{DetectError, FaceRegion, Signature, SIGNATURE_DIM};

const ENC_INPUT_SIZE: usize = 112;
const ENC_MEAN: f32 = 127.5;
const ENC_STD: f32 = 127.5;
/// Margin around the detection box, as a fraction of its larger side.
const ENC_CROP_MARGIN: f32 = 0.25;

/// ONNX signature encoder.
pub struct SignatureEncoder {
    session: Session,
}

impl SignatureEncoder {
    /// Load the embedding model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectError> {
        if !Path::new(model_path).exists() {
            return Err(DetectError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(2))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;

        tracing::info!(path = model_path, "loaded embedding model");
        Ok(Self { session })
    }

    /// Extract the signature for one detected face.
    pub fn encode(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        region: &FaceRegion,
    ) -> Result<Signature, DetectError> {
        let expected = (width * height) as usize;
        if gray.len() < expected {
            return Err(DetectError::BadFrame {
                expected,
                actual: gray.len(),
            });
        }

        let crop = crop_square(gray, width, height, region, ENC_CROP_MARGIN);
        let resized = imageops::resize(
            &crop,
            ENC_INPUT_SIZE as u32,
            ENC_INPUT_SIZE as u32,
            FilterType::Triangle,
        );
        let input = preprocess(&resized);

        let input_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_ref])
            .map_err(|e| DetectError::InferenceFailed(e.to_string()))?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != SIGNATURE_DIM {
            return Err(DetectError::InferenceFailed(format!(
                "expected {SIGNATURE_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Signature::new(l2_normalize(raw))?)
    }
}

/// Cut a margin-expanded square crop around the region, zero-padding
/// anything outside the frame.
fn crop_square(
    gray: &[u8],
    width: u32,
    height: u32,
    region: &FaceRegion,
    margin: f32,
) -> GrayImage {
    let side = region.width.max(region.height) * (1.0 + 2.0 * margin);
    let side = side.max(1.0).round() as i64;
    let cx = region.x + region.width / 2.0;
    let cy = region.y + region.height / 2.0;
    let x0 = (cx - side as f32 / 2.0).round() as i64;
    let y0 = (cy - side as f32 / 2.0).round() as i64;

    let mut crop = GrayImage::new(side as u32, side as u32);
    for dy in 0..side {
        let sy = y0 + dy;
        if sy < 0 || sy >= height as i64 {
            continue;
        }
        for dx in 0..side {
            let sx = x0 + dx;
            if sx < 0 || sx >= width as i64 {
                continue;
            }
            let pixel = gray[sy as usize * width as usize + sx as usize];
            crop.put_pixel(dx as u32, dy as u32, image::Luma([pixel]));
        }
    }
    crop
}

/// Normalize a 112x112 gray crop into a NCHW tensor, gray replicated to
/// three channels.
fn preprocess(crop: &GrayImage) -> Array4<f32> {
    let size = ENC_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = crop.get_pixel(x as u32, y as u32).0[0] as f32;
            let normalized = (pixel - ENC_MEAN) / ENC_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }

    tensor
}

/// L2-normalize and widen to f64. A zero-norm embedding passes through
/// unscaled rather than dividing by zero.
fn l2_normalize(raw: &[f32]) -> Vec<f64> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| (x / norm) as f64).collect()
    } else {
        raw.iter().map(|&x| x as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_inside_frame() {
        // 8x8 frame with a bright 2x2 patch at (3,3).
        let mut gray = vec![0u8; 64];
        for y in 3..5 {
            for x in 3..5 {
                gray[y * 8 + x] = 200;
            }
        }
        let region = FaceRegion {
            x: 3.0,
            y: 3.0,
            width: 2.0,
            height: 2.0,
            confidence: 1.0,
        };
        let crop = crop_square(&gray, 8, 8, &region, 0.0);
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn test_crop_pads_outside_frame() {
        let gray = vec![50u8; 16];
        let region = FaceRegion {
            x: -2.0,
            y: -2.0,
            width: 4.0,
            height: 4.0,
            confidence: 1.0,
        };
        let crop = crop_square(&gray, 4, 4, &region, 0.0);
        assert_eq!(crop.width(), 4);
        // Top-left quadrant lies outside the frame: zero fill.
        assert_eq!(crop.get_pixel(0, 0).0[0], 0);
        // Bottom-right quadrant samples the frame.
        assert_eq!(crop.get_pixel(3, 3).0[0], 50);
    }

    #[test]
    fn test_crop_margin_expands_square() {
        let gray = vec![10u8; 100 * 100];
        let region = FaceRegion {
            x: 40.0,
            y: 40.0,
            width: 20.0,
            height: 10.0,
            confidence: 1.0,
        };
        let crop = crop_square(&gray, 100, 100, &region, 0.25);
        // max side 20 * 1.5 = 30
        assert_eq!(crop.width(), 30);
        assert_eq!(crop.height(), 30);
    }

    #[test]
    fn test_preprocess_normalization() {
        let crop = GrayImage::from_pixel(
            ENC_INPUT_SIZE as u32,
            ENC_INPUT_SIZE as u32,
            image::Luma([128]),
        );
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, ENC_INPUT_SIZE, ENC_INPUT_SIZE]);
        let expected = (128.0 - ENC_MEAN) / ENC_STD;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 5, 5]], tensor[[0, 2, 5, 5]]);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let raw = vec![3.0f32, 4.0];
        let n = l2_normalize(&raw);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        let norm: f64 = n.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let raw = vec![0.0f32; 4];
        assert_eq!(l2_normalize(&raw), vec![0.0f64; 4]);
    }
}
