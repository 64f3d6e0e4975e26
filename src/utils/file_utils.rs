use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Sibling path used while a download is still in flight.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    Ok(())
}

/// Move a completed `.part` file over its final name.
pub fn promote_part(part: &Path, dest: &Path) -> Result<()> {
    fs::rename(part, dest).with_context(|| format!("Failed to move {:?} to {:?}", part, dest))
}

pub fn discard_part(part: &Path) {
    if part.exists() {
        let _ = fs::remove_file(part);
    }
}

pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == extension))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_keeps_directory_and_extension() {
        let part = part_path(Path::new("sources/Sahara2EU-002.webm"));
        assert_eq!(part, PathBuf::from("sources/Sahara2EU-002.webm.part"));
    }

    #[test]
    fn promote_replaces_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("clip.webm");
        ensure_parent_dir(&dest).unwrap();
        let part = part_path(&dest);
        fs::write(&part, b"data").unwrap();

        promote_part(&part, &dest).unwrap();

        assert!(!part.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn list_files_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frame_2.png"), b"").unwrap();
        fs::write(dir.path().join("frame_1.png"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let files = list_files(dir.path(), "png").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("frame_1.png"));
    }
}
