//! Local storage for downloaded profile photos.
//!
//! Each photo lands in `<directory>/ProfilePhoto-<user id>.jpg`. Saving and
//! opening in the system viewer are separate steps with separate results.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GraphError, Result};

/// Writes profile photos under one directory.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    directory: PathBuf,
}

impl PhotoStore {
    /// Store rooted at `directory`, which is created on first save.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        PhotoStore {
            directory: directory.into(),
        }
    }

    /// The directory photos are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Deterministic file location for `user_id`.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.directory.join(format!("ProfilePhoto-{user_id}.jpg"))
    }

    /// Writes `photo`, creating the directory if needed. An existing file
    /// for the same user is overwritten.
    pub fn save(&self, user_id: &str, photo: &[u8]) -> Result<PathBuf> {
        if user_id.trim().is_empty() || user_id.contains(['/', '\\']) {
            return Err(GraphError::InvalidArgument(format!(
                "unusable user id for photo file name: {user_id:?}"
            )));
        }
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(user_id);
        fs::write(&path, photo)?;
        info!(user_id, path = %path.display(), bytes = photo.len(), "saved profile photo");
        Ok(path)
    }
}

/// Opens `path` with the platform's default image viewer.
pub fn open_in_viewer(path: &Path) -> Result<()> {
    debug!(path = %path.display(), "opening photo in default viewer");
    open::that(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path().join("Trials").join("ProfilePhotos"));

        let path = store.save("user-1", b"\xFF\xD8\xFFjpeg").unwrap();

        assert_eq!(path, store.path_for("user-1"));
        assert!(path.ends_with("ProfilePhoto-user-1.jpg"));
        assert_eq!(fs::read(&path).unwrap(), b"\xFF\xD8\xFFjpeg");
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        store.save("user-1", b"old").unwrap();
        let path = store.save("user-1", b"new").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn save_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        assert!(store.save("", b"x").is_err());
        assert!(store.save("../escape", b"x").is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
