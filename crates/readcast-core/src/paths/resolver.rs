//! All data paths resolved in one call.
//!
//! Used by the composition root and printed by `readcast paths`.

use std::fmt;
use std::path::{Path, PathBuf};

use super::{
    CACHE_DIR_NAME, CONTENT_DIR_NAME, PathError, QUEUE_FILE_NAME, SETTINGS_FILE_NAME, data_root,
    ensure_directory,
};

/// Every path readcast reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub data_root: PathBuf,
    pub settings_path: PathBuf,
    pub queue_path: PathBuf,
    /// Synthesized speech artifacts and their index.
    pub cache_dir: PathBuf,
    /// Records served by the file-backed content store.
    pub content_dir: PathBuf,
}

impl ResolvedPaths {
    /// Resolve from the environment (`READCAST_DATA_DIR` or the system
    /// data directory).
    pub fn resolve() -> Result<Self, PathError> {
        Ok(Self::layout(data_root()?))
    }

    /// Resolve under an explicit root, creating it if needed.
    pub fn at(root: &Path) -> Result<Self, PathError> {
        if root.as_os_str().is_empty() {
            return Err(PathError::EmptyDataDir);
        }
        ensure_directory(root)?;
        Ok(Self::layout(root.to_path_buf()))
    }

    /// Create the cache and content directories.
    pub fn ensure_dirs(&self) -> Result<(), PathError> {
        ensure_directory(&self.cache_dir)?;
        ensure_directory(&self.content_dir)
    }

    fn layout(root: PathBuf) -> Self {
        Self {
            settings_path: root.join(SETTINGS_FILE_NAME),
            queue_path: root.join(QUEUE_FILE_NAME),
            cache_dir: root.join(CACHE_DIR_NAME),
            content_dir: root.join(CONTENT_DIR_NAME),
            data_root: root,
        }
    }
}

impl fmt::Display for ResolvedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data_root = {}", self.data_root.display())?;
        writeln!(f, "settings_path = {}", self.settings_path.display())?;
        writeln!(f, "queue_path = {}", self.queue_path.display())?;
        writeln!(f, "cache_dir = {}", self.cache_dir.display())?;
        write!(f, "content_dir = {}", self.content_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_explicit_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("readcast");

        let paths = ResolvedPaths::at(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(paths.queue_path, root.join("queue.json"));
        assert_eq!(paths.cache_dir, root.join("tts-cache"));
        assert!(!paths.content_dir.exists());

        paths.ensure_dirs().unwrap();
        assert!(paths.cache_dir.is_dir());
        assert!(paths.content_dir.is_dir());
    }

    #[test]
    fn test_display_is_key_value() {
        let dir = tempfile::tempdir().unwrap();
        let output = ResolvedPaths::at(dir.path()).unwrap().to_string();
        for key in ["data_root", "settings_path", "queue_path", "cache_dir", "content_dir"] {
            assert!(output.contains(&format!("{key} = ")), "missing {key}");
        }
    }
}
