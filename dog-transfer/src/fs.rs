//! File-system helpers used around a transfer

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Size of the file at `path` in bytes
pub async fn file_size(path: &Path) -> io::Result<u64> {
    Ok(tokio::fs::metadata(path).await?.len())
}

/// Sibling path `<name>.<random>` a download is written to before the final rename
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let suffix = Uuid::new_v4().simple().to_string();
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".");
    name.push(&suffix[..8]);
    destination.with_file_name(name)
}

/// Remove `path`, treating an already missing file as success
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_a_sibling() {
        let destination = Path::new("/data/videos/clip.mp4");
        let temp = temp_path_for(destination);

        assert_eq!(temp.parent(), destination.parent());
        let name = temp.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("clip.mp4."));
        assert_eq!(name.len(), "clip.mp4.".len() + 8);
        assert_ne!(temp_path_for(destination), temp);
    }

    #[tokio::test]
    async fn remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written");
        remove_if_exists(&path).await.unwrap();

        tokio::fs::write(&path, b"x").await.unwrap();
        assert_eq!(file_size(&path).await.unwrap(), 1);
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
