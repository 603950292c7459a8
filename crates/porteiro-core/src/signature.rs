use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dimensionality of every face signature in the system.
///
/// The blob codec and the ONNX encoder output are both validated
/// against this, so the matcher never sees a malformed vector.
pub const SIGNATURE_DIM: usize = 128;

/// Fixed width of an encoded signature: one little-endian f64 per dimension.
pub const SIGNATURE_BYTES: usize = SIGNATURE_DIM * 8;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("signature blob has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("signature has {actual} dimensions, expected {expected}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Fixed-length face signature vector.
///
/// Serialized as a bare array; deserialization goes through the same
/// dimension check as [`Signature::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Signature {
    values: Vec<f64>,
}

impl TryFrom<Vec<f64>> for Signature {
    type Error = SignatureError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Signature::new(values)
    }
}

impl From<Signature> for Vec<f64> {
    fn from(signature: Signature) -> Self {
        signature.values
    }
}

impl Signature {
    /// Wrap a vector, rejecting anything that is not [`SIGNATURE_DIM`]-long.
    pub fn new(values: Vec<f64>) -> Result<Self, SignatureError> {
        if values.len() != SIGNATURE_DIM {
            return Err(SignatureError::InvalidDimension {
                expected: SIGNATURE_DIM,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Encode as a fixed-width blob: [`SIGNATURE_DIM`] little-endian f64s.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SIGNATURE_BYTES);
        for v in &self.values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Decode a blob produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Round-trips exactly: every bit pattern, NaN included, is preserved.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_BYTES {
            return Err(SignatureError::InvalidLength {
                expected: SIGNATURE_BYTES,
                actual: bytes.len(),
            });
        }
        let values = bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().expect("chunks_exact yields 8 bytes")))
            .collect();
        Ok(Self { values })
    }

    /// Euclidean (L2) distance to another signature.
    pub fn euclidean_distance(&self, other: &Signature) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Cosine distance (1 − cosine similarity) to another signature.
    ///
    /// Always processes all dimensions; a zero-norm operand yields the
    /// maximum distance 1.0 rather than NaN.
    pub fn cosine_distance(&self, other: &Signature) -> f64 {
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            1.0 - dot / denom
        } else {
            1.0
        }
    }
}

/// Distance metric used by the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// L2 distance over raw vectors. Pairs with the default 0.6 tolerance.
    #[default]
    Euclidean,
    /// 1 − cosine similarity. Needs a correspondingly smaller tolerance.
    Cosine,
}

impl Metric {
    pub fn distance(&self, a: &Signature, b: &Signature) -> f64 {
        match self {
            Metric::Euclidean => a.euclidean_distance(b),
            Metric::Cosine => a.cosine_distance(b),
        }
    }
}
