//! GGUF model file validation
//!
//! Reads the fixed-size GGUF header so that corrupt or truncated downloads
//! fail with a readable message before llama.cpp ever touches the file.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Magic bytes at the start of every GGUF file
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// GGUF header versions this loader accepts
const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(String),

    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too small to be a GGUF model")]
    Truncated,

    #[error("Not a GGUF file (bad magic)")]
    InvalidMagic,

    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),
}

/// Header metadata of a GGUF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgufMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub kv_count: u64,
}

/// Validate the GGUF header of the file at `path`
pub fn validate_gguf(path: &Path) -> Result<GgufMetadata, ModelError> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.display().to_string()));
    }

    let mut file = File::open(path)?;

    let mut magic = [0u8; 4];
    read_header_bytes(&mut file, &mut magic)?;
    if magic != GGUF_MAGIC {
        return Err(ModelError::InvalidMagic);
    }

    let mut word = [0u8; 4];
    read_header_bytes(&mut file, &mut word)?;
    let version = u32::from_le_bytes(word);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let mut long = [0u8; 8];
    read_header_bytes(&mut file, &mut long)?;
    let tensor_count = u64::from_le_bytes(long);
    read_header_bytes(&mut file, &mut long)?;
    let kv_count = u64::from_le_bytes(long);

    Ok(GgufMetadata {
        version,
        tensor_count,
        kv_count,
    })
}

fn read_header_bytes(file: &mut File, buf: &mut [u8]) -> Result<(), ModelError> {
    file.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ModelError::Truncated,
        _ => ModelError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn gguf_file(version: u32, tensor_count: u64, kv_count: u64) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&GGUF_MAGIC).unwrap();
        file.write_all(&version.to_le_bytes()).unwrap();
        file.write_all(&tensor_count.to_le_bytes()).unwrap();
        file.write_all(&kv_count.to_le_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_valid_header_v3() {
        let file = gguf_file(3, 291, 24);
        let meta = validate_gguf(file.path()).unwrap();
        assert_eq!(meta.version, 3);
        assert_eq!(meta.tensor_count, 291);
        assert_eq!(meta.kv_count, 24);
    }

    #[test]
    fn test_valid_header_v2() {
        let file = gguf_file(2, 1, 1);
        assert!(validate_gguf(file.path()).is_ok());
    }

    #[test]
    fn test_rejects_wrong_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"GGML").unwrap();
        file.write_all(&[0u8; 20]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            validate_gguf(file.path()),
            Err(ModelError::InvalidMagic)
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let file = gguf_file(1, 0, 0);
        assert!(matches!(
            validate_gguf(file.path()),
            Err(ModelError::UnsupportedVersion(1))
        ));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"GGUF\x03").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            validate_gguf(file.path()),
            Err(ModelError::Truncated)
        ));
    }

    #[test]
    fn test_rejects_missing_file() {
        let path = Path::new("/nonexistent/model.gguf");
        assert!(matches!(
            validate_gguf(path),
            Err(ModelError::NotFound(_))
        ));
    }
}
