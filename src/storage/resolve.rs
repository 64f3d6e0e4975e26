use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::{ObjectStore, RemoteObject, StorageError};

/// Where a background medium will be opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Local(PathBuf),
    /// Presigned URL streamed by the video reader.
    Stream(String),
    /// Nothing reachable; the player runs without a picture.
    Unavailable,
}

impl MediaSource {
    /// Argument for OpenCV's capture constructor.
    pub fn location(&self) -> Option<String> {
        match self {
            MediaSource::Local(path) => Some(path.to_string_lossy().into_owned()),
            MediaSource::Stream(url) => Some(url.clone()),
            MediaSource::Unavailable => None,
        }
    }
}

/// Pick the source for the background video.
///
/// Local file first. Otherwise ask remote storage: with `download` the
/// object is cached at `local` for later runs, without it a presigned URL is
/// streamed. Remote failures, and a download cut short by clearing
/// `running`, are logged and yield `Unavailable`.
pub fn resolve_video(
    local: &Path,
    object: &RemoteObject,
    download: bool,
    expiry: Duration,
    store: Option<&dyn ObjectStore>,
    running: &AtomicBool,
) -> MediaSource {
    if local.exists() {
        return MediaSource::Local(local.to_path_buf());
    }
    tracing::warn!("Video {} was not found locally.", local.display());

    let Some(store) = store else {
        tracing::warn!("Could not reach remote storage. Proceeding without video...");
        return MediaSource::Unavailable;
    };

    match fetch_video(local, object, download, expiry, store, running) {
        Ok(source) => source,
        Err(StorageError::Interrupted(what)) => {
            tracing::warn!("Download of {} interrupted. Proceeding without video...", what);
            MediaSource::Unavailable
        }
        Err(e) => {
            tracing::warn!("Remote access failed: {}", e);
            tracing::warn!("Could not reach remote storage. Proceeding without video...");
            MediaSource::Unavailable
        }
    }
}

fn fetch_video(
    local: &Path,
    object: &RemoteObject,
    download: bool,
    expiry: Duration,
    store: &dyn ObjectStore,
    running: &AtomicBool,
) -> Result<MediaSource, StorageError> {
    tracing::info!("Attempting to fetch video remotely from {}", object);
    let size = store.content_length(object)?;
    tracing::info!("Remote video is {} bytes", size);

    if download {
        tracing::info!("Downloading and storing video, this may take a while depending on file size.");
        store.download(object, local, running)?;
        tracing::info!("Video stored at {}", local.display());
        Ok(MediaSource::Local(local.to_path_buf()))
    } else {
        tracing::info!("Remotely streaming video, file won't be stored locally.");
        tracing::warn!(
            "It may take a while for OpenCV to begin playing a streamed video from the start_at frame!"
        );
        Ok(MediaSource::Stream(store.presign_get(object, expiry)?))
    }
}

/// Pick the local path of the background raster, downloading it when it is
/// missing. The raster reader needs a file, so there is no streaming option
/// and failure, including an interrupted download, is an error.
pub fn resolve_image(
    local: &Path,
    object: &RemoteObject,
    store: Option<&dyn ObjectStore>,
    running: &AtomicBool,
) -> Result<PathBuf> {
    if local.exists() {
        return Ok(local.to_path_buf());
    }
    tracing::warn!("Image {} was not found locally.", local.display());

    let store = store.ok_or_else(|| {
        anyhow!(
            "Image {} is missing and remote storage is unreachable",
            local.display()
        )
    })?;
    tracing::info!("Downloading image from {}", object);
    let bytes = store
        .download(object, local, running)
        .with_context(|| format!("Failed to fetch {}", object))?;
    tracing::info!("Stored {} bytes at {}", bytes, local.display());
    Ok(local.to_path_buf())
}
