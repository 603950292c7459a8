//! porteiro-core — domain types for the access-control system.
//!
//! Face signatures and their byte codec, the nearest-match policy,
//! the tri-state signal with its file-backed channel, and the
//! detector capability trait implemented by `porteiro-vision`.

pub mod channel;
pub mod matcher;
pub mod signal;
pub mod signature;
pub mod types;

pub use channel::{ChannelError, SignalFile};
pub use matcher::{Match, Matcher, NearestMatcher};
pub use signal::Signal;
pub use signature::{Metric, Signature, SignatureError, SIGNATURE_DIM};
pub use types::{AccessEvent, DetectError, FaceDetector, FaceRegion, Resident};
