//! porteiro-vision — ONNX-backed implementation of the detector capability.
//!
//! An anchor-free multi-stride detector finds face boxes; a lightweight
//! embedding network turns each box into a 128-dimensional signature.
//! Both models run on CPU via ONNX Runtime. The rest of the system only
//! sees the [`FaceDetector`] trait.

pub mod detector;
pub mod encoder;

use porteiro_core::{DetectError, FaceDetector, FaceRegion, Signature};

pub use detector::FaceFinder;
pub use encoder::SignatureEncoder;

/// Detection + encoding bundled behind the capability trait.
pub struct VisionPipeline {
    finder: FaceFinder,
    encoder: SignatureEncoder,
}

impl VisionPipeline {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(detect_model: &str, encode_model: &str) -> Result<Self, DetectError> {
        Ok(Self {
            finder: FaceFinder::load(detect_model)?,
            encoder: SignatureEncoder::load(encode_model)?,
        })
    }
}

impl FaceDetector for VisionPipeline {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, DetectError> {
        self.finder.detect(gray, width, height)
    }

    fn encode(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        regions: &[FaceRegion],
    ) -> Result<Vec<Signature>, DetectError> {
        regions
            .iter()
            .map(|r| self.encoder.encode(gray, width, height, r))
            .collect()
    }
}
