use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::constants;

/// Region of the satellite raster shown as the static background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub row_offset: i32,
    pub col_offset: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            row_offset: constants::CROP_ROW_OFFSET,
            col_offset: constants::CROP_COL_OFFSET,
            width: constants::DISPLAY_WIDTH,
            height: constants::DISPLAY_HEIGHT,
        }
    }
}

/// File-level settings. Every key is optional; missing keys keep the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub images_dir: PathBuf,
    pub sources_dir: PathBuf,
    pub bucket: String,
    pub video_key: String,
    pub image_key: String,
    pub presign_expiry_secs: u64,
    pub crop: CropConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from(constants::IMG_BASE_DIR),
            sources_dir: PathBuf::from(constants::SRC_BASE_DIR),
            bucket: constants::BUCKET_NAME.to_string(),
            video_key: constants::VIDEO_KEY.to_string(),
            image_key: constants::IMAGE_KEY.to_string(),
            presign_expiry_secs: constants::PRESIGN_EXPIRY_SECS,
            crop: CropConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `path` if given, otherwise the default config file when present.
    /// An explicitly named file that is missing is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Path::new(constants::CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn local_video(&self) -> PathBuf {
        self.sources_dir.join(&self.video_key)
    }

    pub fn local_image(&self) -> PathBuf {
        self.sources_dir.join(&self.image_key)
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_installation_layout() {
        let config = AppConfig::default();
        assert_eq!(config.local_video(), PathBuf::from("sources/Sahara2EU-002.webm"));
        assert_eq!(config.local_image(), PathBuf::from("sources/BlackMarble_2016_C1_geo.tif"));
        assert_eq!(config.bucket, "vesna-camera-control-storage");
        assert_eq!(config.presign_expiry(), Duration::from_secs(3600));
        assert_eq!(config.crop.width, 1920);
        assert_eq!(config.crop.height, 1080);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_control.json");
        std::fs::write(&path, r#"{"bucket": "other-bucket", "crop": {"row_offset": 0}}"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.bucket, "other-bucket");
        assert_eq!(config.crop.row_offset, 0);
        assert_eq!(config.crop.col_offset, constants::CROP_COL_OFFSET);
        assert_eq!(config.video_key, constants::VIDEO_KEY);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.json"))).is_err());
    }
}
