use anyhow::Result;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::background::{BackgroundPlayer, StaticBackground, VideoPlayback};
use crate::camera::{CameraDevice, CameraSettings, FrameSource};
use crate::core::capture::{self, CaptureReport};
use crate::core::config::AppConfig;
use crate::core::session;
use crate::shared::constants;
use crate::storage::{self, ObjectStore, RemoteObject, S3Store};
use crate::sync::FramePacer;
use crate::utils::file_utils;

/// Everything one capture session needs beyond the file config.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub session: String,
    pub num_frames: u32,
    pub start_at_secs: u32,
    pub photo: bool,
    pub download: bool,
    pub camera: CameraSettings,
}

/// Prepare the output folder, open camera and background, capture, clean up.
pub fn run(options: &SessionOptions, config: &AppConfig, running: &AtomicBool) -> Result<CaptureReport> {
    let dir = session::prepare_session_dir(&config.images_dir, &options.session)?;
    tracing::info!("Saving frames to {}", dir.display());

    let mut camera = match CameraDevice::open(options.camera.clone()) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!("Camera can't open, exit");
            return Err(e);
        }
    };

    let mut background = match open_background(options, config, running) {
        Ok(background) => background,
        Err(e) => return abandon_setup(&mut camera, e, running),
    };

    run_session(
        &mut camera,
        background.as_mut(),
        &dir,
        options.num_frames,
        options.camera.fps,
        running,
    )
}

/// Background setup failed before capture began. Release the camera; a
/// failure caused by Ctrl-C (an aborted download) counts as an interrupted
/// run rather than an error.
fn abandon_setup(camera: &mut dyn FrameSource, err: anyhow::Error, running: &AtomicBool) -> Result<CaptureReport> {
    camera.release()?;
    tracing::info!("Camera released.");
    if running.load(Ordering::SeqCst) {
        return Err(err);
    }
    tracing::warn!("Capture interrupted.");
    tracing::debug!("Background setup abandoned: {:#}", err);
    Ok(CaptureReport {
        interrupted: true,
        ..CaptureReport::default()
    })
}

/// Start the background, run the capture loop, then release the camera and
/// stop the background whatever the loop's outcome.
pub fn run_session(
    camera: &mut dyn FrameSource,
    background: &mut dyn BackgroundPlayer,
    dir: &Path,
    num_frames: u32,
    fps: f64,
    running: &AtomicBool,
) -> Result<CaptureReport> {
    let result = match background.start() {
        Ok(()) => {
            let mut pacer = FramePacer::new(fps);
            capture::run_capture(camera, dir, num_frames, &mut pacer, running)
        }
        Err(e) => Err(e),
    };

    if let Ok(report) = &result {
        if report.interrupted {
            tracing::warn!("Capture interrupted.");
        }
    }

    let released = camera.release();
    tracing::info!("Camera released.");
    tracing::info!("Stopping background.");
    let stopped = background.stop();

    let report = result?;
    released?;
    stopped?;
    let stored = file_utils::list_files(dir, constants::FRAME_FILE_EXTENSION)
        .map(|files| files.len())
        .unwrap_or(0);
    tracing::info!(
        "Session done: {} frames written, {} failed grabs, {} files in {}.",
        report.written,
        report.failed,
        stored,
        dir.display()
    );
    Ok(report)
}

fn open_background(
    options: &SessionOptions,
    config: &AppConfig,
    running: &AtomicBool,
) -> Result<Box<dyn BackgroundPlayer>> {
    if options.photo {
        let local = config.local_image();
        let store = connect_if_missing(&local);
        let object = RemoteObject::new(&config.bucket, &config.image_key);
        let path = storage::resolve_image(
            &local,
            &object,
            store.as_ref().map(|s| s as &dyn ObjectStore),
            running,
        )?;
        Ok(Box::new(StaticBackground::load(&path, &config.crop)?))
    } else {
        let local = config.local_video();
        let store = connect_if_missing(&local);
        let object = RemoteObject::new(&config.bucket, &config.video_key);
        let source = storage::resolve_video(
            &local,
            &object,
            options.download,
            config.presign_expiry(),
            store.as_ref().map(|s| s as &dyn ObjectStore),
            running,
        );
        Ok(Box::new(VideoPlayback::open(&source, options.start_at_secs)?))
    }
}

fn connect_if_missing(local: &Path) -> Option<S3Store> {
    if local.exists() {
        return None;
    }
    match S3Store::connect() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("Remote storage unavailable: {}", e);
            None
        }
    }
}
