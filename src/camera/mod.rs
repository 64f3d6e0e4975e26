pub mod device;

pub use device::{depth_name, CameraDevice, CameraSettings, PixelFormat};

use anyhow::Result;
use opencv::core::Mat;

/// Anything the capture loop can pull still frames from.
pub trait FrameSource {
    /// Block until the next frame. `Ok(None)` is a failed grab.
    fn read_frame(&mut self) -> Result<Option<Mat>>;
    /// Current exposure time as reported by the device.
    fn exposure(&self) -> Result<f64>;
    /// Free the device. Calling it more than once is harmless.
    fn release(&mut self) -> Result<()>;
}
