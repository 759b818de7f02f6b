//! Sandboxed study-material storage.
//!
//! Agents and uploads read and write files in a single directory. File names
//! are reduced to a safe character set and every resolved path is checked to
//! stay inside the sandbox root.

use crate::error::{Result, StudyError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File store confined to one directory.
#[derive(Debug, Clone)]
pub struct MaterialStore {
    root: PathBuf,
}

impl MaterialStore {
    /// Open (and create) the sandbox directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reduce a file name to alphanumerics and `._- `.
    ///
    /// Path separators disappear, leading dots are dropped so the result can
    /// never be `.` or `..`, and spaces become underscores.
    pub fn sanitize(filename: &str) -> String {
        let safe: String = filename
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
            .collect();
        let safe = safe.trim().trim_start_matches('.').trim().replace(' ', "_");
        if safe.is_empty() {
            "untitled".to_string()
        } else {
            safe
        }
    }

    /// Resolve a sanitized name inside the sandbox.
    fn safe_path(&self, filename: &str) -> Result<PathBuf> {
        let path = self.root.join(filename);
        // An existing entry may be a symlink; judge where it really points.
        let resolved = if path.exists() { path.canonicalize()? } else { path };
        if resolved.parent() != Some(self.root.as_path()) {
            return Err(StudyError::InvalidInput("Path traversal attempt blocked".to_string()));
        }
        Ok(resolved)
    }

    /// Write text, returning the sanitized name it was stored under.
    pub fn write(&self, filename: &str, content: &str) -> Result<String> {
        let name = Self::sanitize(filename);
        let path = self.safe_path(&name)?;
        std::fs::write(&path, content)?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(name)
    }

    /// Write raw bytes (uploads), returning the stored path.
    pub fn write_bytes(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = Self::sanitize(filename);
        let path = self.safe_path(&name)?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read text, returning the sanitized name and the content.
    pub fn read(&self, filename: &str) -> Result<(String, String)> {
        let name = Self::sanitize(filename);
        let path = self.safe_path(&name)?;
        if !path.exists() {
            return Err(StudyError::InvalidInput(format!("File not found: {}", name)));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok((name, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(MaterialStore::sanitize("my notes.txt"), "my_notes.txt");
        assert_eq!(MaterialStore::sanitize("../../etc/passwd"), "etcpasswd");
        assert_eq!(MaterialStore::sanitize(".."), "untitled");
        assert_eq!(MaterialStore::sanitize("/\\:*?"), "untitled");
        assert_eq!(MaterialStore::sanitize(".env"), "env");
    }

    #[test]
    fn test_traversal_stays_in_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let store = MaterialStore::new(dir.path().join("materials")).unwrap();

        let name = store.write("../../etc/passwd", "not really").unwrap();
        assert_eq!(name, "etcpasswd");

        let written = store.root().join(&name);
        assert!(written.exists());
        assert!(written.starts_with(store.root()));
        assert!(!dir.path().join("etc").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MaterialStore::new(dir.path()).unwrap();
        let err = store.read("absent.md").unwrap_err();
        assert!(err.to_string().contains("File not found: absent.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_blocked() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = MaterialStore::new(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), store.root().join("link.txt")).unwrap();

        assert!(store.read("link.txt").is_err());
    }
}
