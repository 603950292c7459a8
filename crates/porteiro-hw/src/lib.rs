//! porteiro-hw — V4L2 camera access and frame processing for the
//! access-control loop.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, FrameSource, PixelFormat};
pub use frame::Frame;
