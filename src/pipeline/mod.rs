pub mod camera;
pub mod convert;

pub use camera::{capture_single_frame, CameraSource, CaptureError, FrameSource};
