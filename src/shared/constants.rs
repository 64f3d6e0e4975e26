pub const APP_NAME: &str = "camera-control";

pub const CONFIG_FILE: &str = "camera_control.json";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

pub const IMG_BASE_DIR: &str = "images";
pub const SRC_BASE_DIR: &str = "sources";

pub const FRAME_FILE_PREFIX: &str = "frame_";
pub const FRAME_FILE_EXTENSION: &str = "png";
pub const DIR_COLLISION_SUFFIX: char = '\'';

pub const DEFAULT_SESSION: &str = "test";
pub const DEFAULT_NUM_FRAMES: u32 = 20;
pub const DEFAULT_START_AT_SECS: u32 = 120;

pub const DEFAULT_CAMERA_INDEX: i32 = 0;
pub const DEFAULT_CAMERA_FPS: f64 = 4.0;

pub const DEFAULT_DISPLAY: &str = ":1";
pub const DISPLAY_ENV: &str = "DISPLAY";

pub const BUCKET_NAME: &str = "vesna-camera-control-storage";
pub const VIDEO_KEY: &str = "Sahara2EU-002.webm";
pub const IMAGE_KEY: &str = "BlackMarble_2016_C1_geo.tif";
pub const PRESIGN_EXPIRY_SECS: u64 = 3600;

pub const WINDOW_NAME: &str = "window";
pub const QUIT_KEY: u8 = b'q';
pub const VIDEO_WAIT_MS: i32 = 1;
pub const STILL_WAIT_MS: i32 = 500;
pub const WINDOW_READY_TIMEOUT_SECS: u64 = 10;

pub const CROP_ROW_OFFSET: i32 = 15000;
pub const CROP_COL_OFFSET: i32 = 10000;
pub const DISPLAY_WIDTH: i32 = 1920;
pub const DISPLAY_HEIGHT: i32 = 1080;
