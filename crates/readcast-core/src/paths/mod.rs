//! Path resolution for readcast data.
//!
//! Everything lives under one data root:
//!
//! ```text
//! <data root>/
//!   settings.json
//!   queue.json
//!   tts-cache/
//!     index.json
//!     <sha256>.<ext>
//!   content/
//!     <content id>.json
//! ```
//!
//! Resolution order for the root:
//! 1. `READCAST_DATA_DIR` environment variable
//! 2. System data directory (e.g. `~/.local/share/readcast`)

mod error;
mod resolver;

#[cfg(test)]
mod test_utils;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use error::PathError;
pub use resolver::ResolvedPaths;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "READCAST_DATA_DIR";

const APP_DIR_NAME: &str = "readcast";
const QUEUE_FILE_NAME: &str = "queue.json";
const SETTINGS_FILE_NAME: &str = "settings.json";
const CACHE_DIR_NAME: &str = "tts-cache";
const CONTENT_DIR_NAME: &str = "content";

/// Get the root directory for application data, creating it if needed.
pub fn data_root() -> Result<PathBuf, PathError> {
    let root = match env::var(DATA_DIR_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        Ok(_) => return Err(PathError::EmptyDataDir),
        Err(_) => dirs::data_dir()
            .ok_or(PathError::NoDataDir)?
            .join(APP_DIR_NAME),
    };

    ensure_directory(&root)?;
    Ok(root)
}

/// Path of the persisted queue document.
pub fn queue_document_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(QUEUE_FILE_NAME))
}

/// Path of the settings file.
pub fn settings_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(SETTINGS_FILE_NAME))
}

/// Directory holding synthesized speech artifacts, created if needed.
pub fn cache_dir() -> Result<PathBuf, PathError> {
    let dir = data_root()?.join(CACHE_DIR_NAME);
    ensure_directory(&dir)?;
    Ok(dir)
}

/// Create `path` (and parents) if missing; fail if it exists as a file.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::test_utils::{ENV_LOCK, EnvVarGuard};
    use super::*;

    #[test]
    fn test_env_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let _env = EnvVarGuard::set(DATA_DIR_ENV, root.to_str().unwrap());

        assert_eq!(data_root().unwrap(), root);
        assert!(root.is_dir());
        assert_eq!(queue_document_path().unwrap(), root.join("queue.json"));
        assert_eq!(settings_path().unwrap(), root.join("settings.json"));

        let cache = cache_dir().unwrap();
        assert_eq!(cache, root.join("tts-cache"));
        assert!(cache.is_dir());
    }

    #[test]
    fn test_empty_override_rejected() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(DATA_DIR_ENV, "  ");
        assert!(matches!(data_root(), Err(PathError::EmptyDataDir)));
    }

    #[test]
    fn test_ensure_directory_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_directory(&file),
            Err(PathError::NotADirectory(_))
        ));
    }
}
