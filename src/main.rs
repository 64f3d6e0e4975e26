mod background;
mod camera;
mod core;
mod shared;
mod storage;
mod sync;
mod utils;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::{CameraSettings, PixelFormat};
use crate::core::app::{self, SessionOptions};
use crate::core::config::AppConfig;
use crate::shared::constants;
use crate::storage::{ObjectStore, S3Store};

/// Capture camera stills while a full-screen background plays on a second display.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target images folder name
    #[arg(default_value = constants::DEFAULT_SESSION)]
    folder_name: String,

    /// Number of frames to capture
    #[arg(default_value_t = constants::DEFAULT_NUM_FRAMES)]
    num_frames: u32,

    /// Start video at specific position (seconds)
    #[arg(default_value_t = constants::DEFAULT_START_AT_SECS)]
    start_at: u32,

    /// Use photo (static background) instead of video
    #[arg(default_value_t = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    photo: bool,

    /// Download and locally store source footage if obtaining it remotely
    #[arg(default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    download: bool,

    /// X display that shows the background
    #[arg(long, env = "CAPTURE_DISPLAY", default_value = constants::DEFAULT_DISPLAY)]
    display: String,

    /// Camera device index
    #[arg(long, default_value_t = constants::DEFAULT_CAMERA_INDEX)]
    camera_index: i32,

    /// Camera frame rate
    #[arg(long, default_value_t = constants::DEFAULT_CAMERA_FPS)]
    fps: f64,

    /// Camera pixel format
    #[arg(long, value_enum, default_value_t = PixelFormat::Mono16)]
    pixel_format: PixelFormat,

    /// JSON config file (defaults to camera_control.json when present)
    #[arg(long, env = "CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Debug log file
    #[arg(long, default_value = constants::DEBUG_LOG_FILE)]
    log_file: PathBuf,

    /// Verify the remote media bucket is reachable before capturing; abort if it is not
    #[arg(long)]
    check_storage: bool,
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            session: self.folder_name.clone(),
            num_frames: self.num_frames,
            start_at_secs: self.start_at,
            photo: self.photo,
            download: self.download,
            camera: CameraSettings {
                index: self.camera_index,
                fps: self.fps,
                pixel_format: self.pixel_format,
                ..CameraSettings::default()
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    crate::utils::logger::init(&cli.log_file)?;

    // Exported before any thread or window exists.
    if !cli.display.is_empty() {
        std::env::set_var(constants::DISPLAY_ENV, &cli.display);
        tracing::debug!("Background display set to {}", cli.display);
    }

    let config = AppConfig::load(cli.config.as_deref())?;

    if cli.check_storage {
        let store = S3Store::connect()?;
        check_storage(&store, &config.bucket)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let report = app::run(&cli.session_options(), &config, &running)?;
    if report.interrupted {
        tracing::info!("Stopped early after {} of {} frames.", report.written, cli.num_frames);
    }
    Ok(())
}

fn check_storage(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    store
        .check_access(bucket)
        .with_context(|| format!("Bucket '{}' is not accessible", bucket))?;
    tracing::info!("Bucket '{}' is accessible.", bucket);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fake::FakeStore;
    use crate::storage::RemoteObject;
    use clap::CommandFactory;

    #[test]
    fn help_lists_arguments_and_options() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("Usage"));
        assert!(help.contains("Arguments"));
        assert!(help.contains("Options"));
        assert!(help.contains("[FOLDER_NAME]"));
        assert!(help.contains("before capturing"));
    }

    #[test]
    fn storage_check_fails_for_unreachable_bucket() {
        let object = RemoteObject::new("vesna-camera-control-storage", "Sahara2EU-002.webm");
        let store = FakeStore::with_object(object, b"clip");
        assert!(check_storage(&store, "vesna-camera-control-storage").is_ok());

        let err = check_storage(&store, "other-bucket").unwrap_err();
        assert!(format!("{:#}", err).contains("other-bucket"));

        let offline = FakeStore {
            offline: true,
            ..FakeStore::default()
        };
        assert!(check_storage(&offline, "vesna-camera-control-storage").is_err());
    }

    #[test]
    fn defaults_match_installation_run() {
        let cli = Cli::try_parse_from(["camera-control"]).unwrap();
        assert_eq!(cli.folder_name, "test");
        assert_eq!(cli.num_frames, 20);
        assert_eq!(cli.start_at, 120);
        assert!(cli.photo);
        assert!(!cli.download);
        assert_eq!(cli.fps, 4.0);
        assert_eq!(cli.log_file, PathBuf::from("debug.log"));
        assert!(!cli.check_storage);
    }

    #[test]
    fn positional_booleans_accept_python_spelling() {
        let cli = Cli::try_parse_from(["camera-control", "test_img_folder_img", "5", "0", "True"]).unwrap();
        assert_eq!(cli.folder_name, "test_img_folder_img");
        assert_eq!(cli.num_frames, 5);
        assert_eq!(cli.start_at, 0);
        assert!(cli.photo);

        let cli = Cli::try_parse_from(["camera-control", "vid", "5", "0", "False", "yes"]).unwrap();
        assert!(!cli.photo);
        assert!(cli.download);
    }

    #[test]
    fn bad_frame_count_is_rejected() {
        assert!(Cli::try_parse_from(["camera-control", "s", "many"]).is_err());
        assert!(Cli::try_parse_from(["camera-control", "s", "5", "0", "maybe"]).is_err());
    }

    #[test]
    fn options_flow_into_session() {
        let cli = Cli::try_parse_from([
            "camera-control",
            "night",
            "8",
            "30",
            "false",
            "--camera-index",
            "1",
            "--fps",
            "2.5",
            "--pixel-format",
            "mono8",
        ])
        .unwrap();
        let options = cli.session_options();
        assert_eq!(options.session, "night");
        assert_eq!(options.num_frames, 8);
        assert_eq!(options.start_at_secs, 30);
        assert!(!options.photo);
        assert_eq!(options.camera.index, 1);
        assert_eq!(options.camera.fps, 2.5);
        assert_eq!(options.camera.pixel_format, PixelFormat::Mono8);
    }
}
