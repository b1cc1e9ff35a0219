//! Local data storage
//!
//! Resolves the per-user data directory and fetches model files into it.

pub mod huggingface;

use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Could not determine the application data directory")]
    DataDir,

    #[error("Invalid model filename")]
    InvalidFilename,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),
}

/// Get the application data directory, creating it if needed
pub fn get_data_dir() -> Result<PathBuf, StorageError> {
    let dirs = ProjectDirs::from("", "", "locachat").ok_or(StorageError::DataDir)?;
    let dir = dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the directory where model files (.gguf) are stored, creating it if needed
pub fn models_dir() -> Result<PathBuf, StorageError> {
    let dir = get_data_dir()?.join("models");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_resolves() {
        let dir = get_data_dir().unwrap();
        assert!(dir.to_string_lossy().contains("locachat"));
    }

    #[test]
    fn test_models_dir_under_data_dir() {
        let dir = models_dir().unwrap();
        assert!(dir.ends_with("models"));
    }
}
