use anyhow::{anyhow, Context, Result};
use opencv::{
    core::{Mat, Rect, Size},
    imgcodecs,
    prelude::*,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::window::{FullscreenWindow, Screen};
use super::{BackgroundPlayer, DisplayThread, ReadySignal};
use crate::core::config::CropConfig;
use crate::shared::constants;

/// Display-sized window into the raster, clipped to its bounds. `None` when
/// the offsets fall outside the image.
pub fn crop_rect(image: Size, crop: &CropConfig) -> Option<Rect> {
    let x = crop.col_offset.clamp(0, image.width);
    let y = crop.row_offset.clamp(0, image.height);
    let width = crop.width.min(image.width - x);
    let height = crop.height.min(image.height - y);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Rect::new(x, y, width, height))
}

/// Static cropped satellite image, redisplayed until stopped.
pub struct StaticBackground {
    image: Option<Mat>,
    display: Option<DisplayThread>,
}

impl StaticBackground {
    /// Read the GeoTIFF through OpenCV's GDAL loader and crop it.
    pub fn load(path: &Path, crop: &CropConfig) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "Image {} was not found and won't be opened.",
                path.display()
            ));
        }
        let name = path
            .to_str()
            .ok_or_else(|| anyhow!("Image path is not valid UTF-8: {:?}", path))?;

        // GDAL handles georeferenced rasters; IMREAD_COLOR yields 8-bit BGR.
        let raster = imgcodecs::imread(name, imgcodecs::IMREAD_LOAD_GDAL | imgcodecs::IMREAD_COLOR)
            .with_context(|| format!("Failed to read raster {}", name))?;
        if raster.empty() {
            return Err(anyhow!("Raster {} could not be decoded", name));
        }
        tracing::info!("Image opened.");

        let still = Self::from_image(Self::crop(&raster, crop)?);
        if let Some(size) = still.image_size() {
            tracing::debug!("Cropped background is {}x{}", size.width, size.height);
        }
        tracing::info!("Preparing cropped image. Press the 'q' key to close prematurely.");
        Ok(still)
    }

    fn crop(raster: &Mat, crop: &CropConfig) -> Result<Mat> {
        let size = raster.size()?;
        let rect = crop_rect(size, crop).ok_or_else(|| {
            anyhow!(
                "Crop at row {} col {} is outside the {}x{} raster",
                crop.row_offset,
                crop.col_offset,
                size.width,
                size.height
            )
        })?;
        if rect.width < crop.width || rect.height < crop.height {
            tracing::warn!(
                "Crop clipped to {}x{} by raster bounds",
                rect.width,
                rect.height
            );
        }
        Ok(Mat::roi(raster, rect)?.try_clone()?)
    }

    pub fn from_image(image: Mat) -> Self {
        Self {
            image: Some(image),
            display: None,
        }
    }

    pub fn image_size(&self) -> Option<Size> {
        self.image.as_ref().and_then(|m| m.size().ok())
    }
}

/// Show `image` and redisplay it until stopped or the quit key is hit. The
/// window is closed on every exit once it was opened.
fn present(image: &Mat, stop: &AtomicBool, ready: ReadySignal, screen: &mut dyn Screen) -> Result<u64> {
    screen.open()?;
    let shown = redisplay(image, stop, &ready, screen);
    screen.close();
    shown
}

fn redisplay(image: &Mat, stop: &AtomicBool, ready: &ReadySignal, screen: &mut dyn Screen) -> Result<u64> {
    screen.show(image)?;
    ready.ready();

    let mut shown = 1u64;
    while !stop.load(Ordering::SeqCst) {
        if screen.poll_quit(constants::STILL_WAIT_MS)? {
            tracing::info!("Background closed from keyboard.");
            stop.store(true, Ordering::SeqCst);
            break;
        }
        screen.show(image)?;
        shown += 1;
    }
    Ok(shown)
}

impl BackgroundPlayer for StaticBackground {
    fn start(&mut self) -> Result<()> {
        if self.display.is_some() {
            return Ok(());
        }
        let image = self
            .image
            .take()
            .ok_or_else(|| anyhow!("Static background has no image"))?;

        let display = DisplayThread::spawn("background-still", move |stop, ready| {
            let mut screen = FullscreenWindow::new(constants::WINDOW_NAME);
            present(&image, &stop, ready, &mut screen)
        })?;
        self.display = Some(display);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut display) = self.display.take() {
            display.stop()?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.display.as_ref().map_or(false, |d| d.is_running())
    }
}

impl Drop for StaticBackground {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Static background cleanup failed: {:#}", e);
        }
    }
}
