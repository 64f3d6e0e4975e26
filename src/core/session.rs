use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants;

/// First path under `images_dir` for `name` that does not exist yet.
/// Collisions are resolved by appending `'` until the path is free.
pub fn unique_session_dir(images_dir: &Path, name: &str) -> PathBuf {
    let mut candidate = OsString::from(name);
    let mut dir = images_dir.join(&candidate);
    while dir.exists() {
        candidate.push(constants::DIR_COLLISION_SUFFIX.to_string());
        dir = images_dir.join(&candidate);
    }
    dir
}

/// Create the session's output directory. An existing directory is never
/// reused.
pub fn prepare_session_dir(images_dir: &Path, name: &str) -> Result<PathBuf> {
    let requested = images_dir.join(name);
    let dir = unique_session_dir(images_dir, name);
    if dir != requested {
        tracing::info!("Chosen directory for target images already exists;");
        tracing::info!("New target directory is {}", dir.display());
    }

    // Nested names like `2026/night` need their intermediate directories.
    let parent = dir.parent().unwrap_or(images_dir);
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create images directory: {}", parent.display()))?;
    // `create_dir` fails if something raced us to the name.
    fs::create_dir(&dir)
        .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;
    Ok(dir)
}

/// `<dir>/frame_<n>.png`, `n` counted from 1.
pub fn frame_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        constants::FRAME_FILE_PREFIX,
        n,
        constants::FRAME_FILE_EXTENSION
    ))
}
