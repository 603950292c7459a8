use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signature::Signature;

/// An enrolled resident. Immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    /// Row id assigned by the store on insert.
    pub id: i64,
    pub name: String,
    /// Apartment/unit label, free text (e.g. "101").
    pub unit: String,
    /// Building block label, free text (e.g. "B").
    pub block: String,
    #[serde(skip_serializing)]
    pub signature: Signature,
}

/// One row of the append-only access log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub id: i64,
    /// Nullable: reserved for decisions not tied to a known resident.
    pub resident_id: Option<i64>,
    /// RFC 3339 timestamp, assigned at insert.
    pub timestamp: String,
    pub authorized: bool,
}

/// Axis-aligned face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer has {actual} bytes, expected {expected}")]
    BadFrame { expected: usize, actual: usize },
    #[error("encoder produced a malformed signature: {0}")]
    BadSignature(#[from] crate::signature::SignatureError),
}

/// Detector capability: finds faces in a grayscale frame and turns them
/// into signatures.
///
/// `encode` returns one signature per region, in the same order. The
/// decision loop depends only on stable dimensionality and on signatures
/// of the same identity clustering within the matcher tolerance.
pub trait FaceDetector {
    fn detect(&mut self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<FaceRegion>, DetectError>;

    fn encode(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        regions: &[FaceRegion],
    ) -> Result<Vec<Signature>, DetectError>;
}
