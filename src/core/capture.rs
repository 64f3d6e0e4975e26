use anyhow::{anyhow, Context, Result};
use opencv::{core::Vector, imgcodecs, prelude::*};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::camera::{depth_name, FrameSource};
use crate::core::session::frame_path;
use crate::sync::FramePacer;
use crate::utils::time_utils;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub written: u32,
    pub failed: u32,
    pub interrupted: bool,
}

pub fn write_frame(path: &Path, frame: &Mat) -> Result<()> {
    let name = path
        .to_str()
        .ok_or_else(|| anyhow!("Frame path is not valid UTF-8: {:?}", path))?;
    let ok = imgcodecs::imwrite(name, frame, &Vector::new())
        .with_context(|| format!("Failed to encode frame: {}", name))?;
    if !ok {
        return Err(anyhow!("OpenCV refused to write frame: {}", name));
    }
    Ok(())
}

/// Capture `num_frames` stills into `dir` as `frame_1.png`, `frame_2.png`, ...
///
/// Runs until the count is reached or `running` is cleared. A grab that
/// returns no image is logged and leaves a gap in the numbering; a frame that
/// cannot be written aborts the loop.
pub fn run_capture(
    source: &mut dyn FrameSource,
    dir: &Path,
    num_frames: u32,
    pacer: &mut FramePacer,
    running: &AtomicBool,
) -> Result<CaptureReport> {
    let mut report = CaptureReport::default();
    let start = Instant::now();

    for i in 1..=num_frames {
        if !running.load(Ordering::SeqCst) {
            report.interrupted = true;
            break;
        }

        pacer.wait_for_next_frame();
        let frame = source.read_frame()?;
        let exposure = source.exposure().unwrap_or(f64::NAN);
        let dtype = frame.as_ref().map(|f| depth_name(f.depth())).unwrap_or("none");

        tracing::info!(
            "Frame: read={}, i={}, dtype={}, exposure={}, time={:.6}",
            frame.is_some(),
            i,
            dtype,
            exposure,
            time_utils::epoch_secs()
        );

        match frame {
            Some(frame) => {
                write_frame(&frame_path(dir, i), &frame)?;
                report.written += 1;
            }
            None => {
                tracing::warn!("Camera returned no image for frame {}", i);
                report.failed += 1;
            }
        }
    }

    // Interrupt that lands during the last grab still counts.
    if !running.load(Ordering::SeqCst) && report.written + report.failed < num_frames {
        report.interrupted = true;
    }

    let stats = pacer.stats();
    tracing::debug!(
        "Capture loop done: {} written, {} failed, {:.2} fps (target {:.2})",
        report.written,
        report.failed,
        stats.effective_fps(start.elapsed()),
        stats.target_fps
    );
    Ok(report)
}
