//! tunetrap-hw: camera capture.
//!
//! V4L2 capture via the `v4l` crate, converted to RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::Frame;
