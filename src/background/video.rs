use anyhow::Result;
use opencv::{prelude::*, videoio};
use std::sync::atomic::{AtomicBool, Ordering};

use super::window::{FullscreenWindow, Screen};
use super::{BackgroundPlayer, DisplayThread, ReadySignal};
use crate::shared::constants;
use crate::storage::MediaSource;

/// Frame index for a start offset in seconds. Unknown or bogus frame rates
/// start from the beginning.
pub fn start_frame(start_at_secs: u32, fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        (start_at_secs as f64 * fps).floor()
    } else {
        0.0
    }
}

/// Looping background video shown full screen on its own thread.
pub struct VideoPlayback {
    capture: Option<videoio::VideoCapture>,
    first_frame: Option<Mat>,
    fps: f64,
    display: Option<DisplayThread>,
}

impl VideoPlayback {
    /// Open `source` and seek to `start_at_secs`. An unavailable or unreadable
    /// source gives a player that shows nothing.
    pub fn open(source: &MediaSource, start_at_secs: u32) -> Result<Self> {
        let Some(location) = source.location() else {
            tracing::warn!("No background video available.");
            return Ok(Self::empty());
        };

        let mut capture = match videoio::VideoCapture::from_file(&location, videoio::CAP_ANY) {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!("Background video reader failed: {}", e);
                return Ok(Self::empty());
            }
        };
        if !capture.is_opened().unwrap_or(false) {
            tracing::warn!("Background video could not be opened. Proceeding without video...");
            return Ok(Self::empty());
        }
        tracing::info!("Video fetched.");

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        tracing::info!("Background FPS {}, setting start_at frame...", fps);
        let frame = start_frame(start_at_secs, fps);
        if !capture.set(videoio::CAP_PROP_POS_FRAMES, frame)? {
            tracing::warn!("Video backend refused to seek to frame {}", frame);
        }
        tracing::info!("Set start_at frame to {}, {} seconds in.", frame, start_at_secs);

        // Prime the decoder; the frame becomes the first one shown.
        let mut first = Mat::default();
        let first_frame = if capture.read(&mut first)? && !first.empty() {
            Some(first)
        } else {
            tracing::warn!("No frame at start_at offset; playback will start from the top.");
            None
        };

        Ok(Self {
            capture: Some(capture),
            first_frame,
            fps,
            display: None,
        })
    }

    fn empty() -> Self {
        Self {
            capture: None,
            first_frame: None,
            fps: 0.0,
            display: None,
        }
    }

    pub fn has_video(&self) -> bool {
        self.capture.is_some()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

fn play(
    mut capture: videoio::VideoCapture,
    pending: Option<Mat>,
    stop: &AtomicBool,
    ready: ReadySignal,
    screen: &mut dyn Screen,
) -> Result<u64> {
    if let Err(e) = screen.open() {
        let _ = capture.release();
        return Err(e);
    }
    ready.ready();

    let shown = show_frames(&mut capture, pending, stop, screen);
    // Window and reader go away on error exits too.
    screen.close();
    capture.release()?;
    shown
}

fn show_frames(
    capture: &mut videoio::VideoCapture,
    mut pending: Option<Mat>,
    stop: &AtomicBool,
    screen: &mut dyn Screen,
) -> Result<u64> {
    let mut shown = 0u64;
    let mut loops = 0u64;
    let mut empty_reads = 0u32;
    let mut frame = Mat::default();

    while capture.is_opened()? {
        tracing::trace!("Querying whether to stop");
        if stop.load(Ordering::SeqCst) {
            tracing::info!("Background video stopping.");
            break;
        }

        let current = match pending.take() {
            Some(f) => f,
            None => {
                if !capture.read(&mut frame)? || frame.empty() {
                    empty_reads += 1;
                    if empty_reads > 1 {
                        tracing::warn!("Background video yields no frames; ending playback.");
                        break;
                    }
                    capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
                    loops += 1;
                    tracing::debug!("Background video looped ({})", loops);
                    continue;
                }
                empty_reads = 0;
                std::mem::take(&mut frame)
            }
        };

        screen.show(&current)?;
        shown += 1;

        if screen.poll_quit(constants::VIDEO_WAIT_MS)? {
            tracing::info!("Background closed from keyboard.");
            stop.store(true, Ordering::SeqCst);
            break;
        }
    }
    Ok(shown)
}

impl BackgroundPlayer for VideoPlayback {
    fn start(&mut self) -> Result<()> {
        if self.display.is_some() {
            return Ok(());
        }
        if self.has_video() {
            tracing::debug!("Starting background video at {:.2} fps", self.fps());
        }
        let capture = self.capture.take();
        let pending = self.first_frame.take();
        let display = DisplayThread::spawn("background-video", move |stop, ready| match capture {
            Some(capture) => {
                let mut screen = FullscreenWindow::new(constants::WINDOW_NAME);
                play(capture, pending, &stop, ready, &mut screen)
            }
            None => Ok(0),
        })?;
        self.display = Some(display);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut display) = self.display.take() {
            let shown = display.stop()?;
            tracing::info!("Background video showed {} frames.", shown);
        }
        // Never started: the reader is still ours to free.
        if let Some(mut capture) = self.capture.take() {
            capture.release()?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.display.as_ref().map_or(false, |d| d.is_running())
    }
}

impl Drop for VideoPlayback {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("Background video cleanup failed: {:#}", e);
        }
    }
}
