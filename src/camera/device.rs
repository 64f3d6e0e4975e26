use anyhow::{anyhow, Context, Result};
use opencv::{core, prelude::*, videoio};

use super::FrameSource;
use crate::shared::constants;

/// Sensor output requested from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PixelFormat {
    Mono8,
    Mono12,
    /// 12-bit ADC samples delivered in 16-bit words.
    Mono16,
}

impl PixelFormat {
    fn fourcc(self) -> Result<i32> {
        let code = match self {
            PixelFormat::Mono8 => videoio::VideoWriter::fourcc('G', 'R', 'E', 'Y')?,
            PixelFormat::Mono12 => videoio::VideoWriter::fourcc('Y', '1', '2', ' ')?,
            PixelFormat::Mono16 => videoio::VideoWriter::fourcc('Y', '1', '6', ' ')?,
        };
        Ok(code)
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub index: i32,
    pub api_preference: i32,
    pub fps: f64,
    pub pixel_format: PixelFormat,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: constants::DEFAULT_CAMERA_INDEX,
            api_preference: videoio::CAP_ANY,
            fps: constants::DEFAULT_CAMERA_FPS,
            pixel_format: PixelFormat::Mono16,
        }
    }
}

/// Machine-vision camera reached through OpenCV's capture backends.
pub struct CameraDevice {
    capture: videoio::VideoCapture,
    settings: CameraSettings,
    released: bool,
}

impl CameraDevice {
    /// Open the device and push the acquisition settings. A device that does
    /// not open is an error; settings the backend refuses are only logged.
    pub fn open(settings: CameraSettings) -> Result<Self> {
        let mut capture = videoio::VideoCapture::new(settings.index, settings.api_preference)
            .with_context(|| format!("Failed to create capture for camera {}", settings.index))?;

        if !capture.is_opened()? {
            let _ = capture.release();
            return Err(anyhow!("Camera {} can't open", settings.index));
        }

        let mut device = Self {
            capture,
            settings,
            released: false,
        };
        device.apply_settings()?;

        let backend = device
            .capture
            .get_backend_name()
            .unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            "Camera {} opened via {} at {} fps ({:?})",
            device.settings.index,
            backend,
            device.capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0),
            device.settings.pixel_format
        );
        Ok(device)
    }

    fn apply_settings(&mut self) -> Result<()> {
        self.set_property("frame rate", videoio::CAP_PROP_FPS, self.settings.fps)?;
        // Keep raw sensor words; no debayer or RGB expansion.
        self.set_property("RGB conversion", videoio::CAP_PROP_CONVERT_RGB, 0.0)?;
        let fourcc = self.settings.pixel_format.fourcc()?;
        self.set_property("pixel format", videoio::CAP_PROP_FOURCC, fourcc as f64)?;
        Ok(())
    }

    fn set_property(&mut self, name: &str, prop: i32, value: f64) -> Result<()> {
        let accepted = self
            .capture
            .set(prop, value)
            .with_context(|| format!("Failed to set camera {}", name))?;
        if !accepted {
            tracing::warn!("Camera backend ignored {} = {}", name, value);
        }
        Ok(())
    }
}

impl FrameSource for CameraDevice {
    fn read_frame(&mut self) -> Result<Option<Mat>> {
        if self.released {
            return Err(anyhow!("Camera {} already released", self.settings.index));
        }
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn exposure(&self) -> Result<f64> {
        Ok(self.capture.get(videoio::CAP_PROP_EXPOSURE)?)
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.capture.release()?;
        Ok(())
    }
}

impl Drop for CameraDevice {
    fn drop(&mut self) {
        let _ = FrameSource::release(self);
    }
}

/// OpenCV depth constant as its type name (`CV_16U` → `uint16`).
pub fn depth_name(depth: i32) -> &'static str {
    match depth {
        core::CV_8U => "uint8",
        core::CV_8S => "int8",
        core::CV_16U => "uint16",
        core::CV_16S => "int16",
        core::CV_32S => "int32",
        core::CV_32F => "float32",
        core::CV_64F => "float64",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_request_mono16_at_four_fps() {
        let settings = CameraSettings::default();
        assert_eq!(settings.index, 0);
        assert_eq!(settings.fps, 4.0);
        assert_eq!(settings.pixel_format, PixelFormat::Mono16);
    }

    #[test]
    fn pixel_formats_map_to_distinct_fourcc_codes() {
        let mono8 = PixelFormat::Mono8.fourcc().unwrap();
        let mono16 = PixelFormat::Mono16.fourcc().unwrap();
        assert_ne!(mono8, mono16);
        assert_eq!(mono16, i32::from_le_bytes(*b"Y16 "));
    }

    #[test]
    fn depth_names() {
        assert_eq!(depth_name(core::CV_16U), "uint16");
        assert_eq!(depth_name(core::CV_8U), "uint8");
        assert_eq!(depth_name(99), "unknown");
    }
}
