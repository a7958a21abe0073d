//! In-memory copy of a managed config file.
//!
//! Every mutation is a full overwrite of the file followed by an update of
//! the cached text, so the cache always mirrors what is on disk.

use crate::error::{Result, SetupError};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigDocument {
    path: PathBuf,
    content: String,
}

impl ConfigDocument {
    /// Read the file; a missing file loads as an empty document.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = read_lossy(&path)?;
        Ok(Self { path, content })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the whole file with `content`.
    pub fn save(&mut self, content: String) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SetupError::document(parent, e))?;
        }
        fs::write(&self.path, &content).map_err(|e| SetupError::document(&self.path, e))?;
        self.content = content;
        Ok(())
    }

    /// Re-read the file, picking up writes made through another handle.
    pub fn reload(&mut self) -> Result<()> {
        self.content = read_lossy(&self.path)?;
        Ok(())
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(SetupError::document(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let doc = ConfigDocument::load(dir.path().join(".zshrc")).unwrap();
        assert_eq!(doc.content(), "");
        assert!(!doc.exists());
    }

    #[test]
    fn test_save_overwrites_and_caches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        fs::write(&path, "old\n").unwrap();

        let mut doc = ConfigDocument::load(&path).unwrap();
        doc.save("new\n".to_string()).unwrap();

        assert_eq!(doc.content(), "new\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config/.zshrc");
        let mut doc = ConfigDocument::load(&path).unwrap();
        doc.save("x\n".to_string()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reload_sees_external_edit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        let mut doc = ConfigDocument::load(&path).unwrap();
        fs::write(&path, "edited by hand\n").unwrap();
        doc.reload().unwrap();
        assert_eq!(doc.content(), "edited by hand\n");
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".zshrc");
        fs::write(&path, b"alias ok=1\n\xff\n").unwrap();
        let doc = ConfigDocument::load(&path).unwrap();
        assert!(doc.content().starts_with("alias ok=1\n"));
    }
}
