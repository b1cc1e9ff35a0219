//! HuggingFace model downloader
//!
//! Fetches the configured GGUF model from HuggingFace Hub into the local
//! models directory.

use std::fs;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::storage::{models_dir, StorageError};
use crate::types::config::ModelConfig;

/// Build the direct download URL for the configured file
fn resolve_url(config: &ModelConfig) -> String {
    format!(
        "https://huggingface.co/{}/resolve/{}/{}",
        config.repo_id, config.revision, config.filename
    )
}

/// Flatten a repository file path into a single safe local filename
fn sanitize_local_filename(filename: &str) -> Result<String, StorageError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidFilename);
    }

    let no_query = trimmed.split('?').next().unwrap_or(trimmed);
    let no_fragment = no_query.split('#').next().unwrap_or(no_query);
    let no_leading = no_fragment.trim_start_matches('/');

    let flattened = no_leading.replace('\\', "/").replace('/', "__");

    let mut sanitized = String::with_capacity(flattened.len());
    for ch in flattened.chars() {
        let invalid = matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*');
        if invalid || ch.is_control() {
            sanitized.push('_');
        } else {
            sanitized.push(ch);
        }
    }

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        return Err(StorageError::InvalidFilename);
    }

    Ok(sanitized)
}

/// Download the configured model from HuggingFace
///
/// Returns the cached file immediately when it already exists. Otherwise
/// streams the download into a temp file and renames it into place, so an
/// interrupted download never leaves a partial model behind. The callback
/// receives (downloaded, total) byte counts per chunk.
pub async fn download_model(
    config: &ModelConfig,
    progress_callback: impl Fn(u64, u64) + Send + 'static,
) -> Result<PathBuf, StorageError> {
    let safe_filename = sanitize_local_filename(&config.filename)?;

    let models_dir = models_dir()?;
    let output_path = models_dir.join(&safe_filename);
    let temp_path = models_dir.join(format!("{}.tmp", safe_filename));

    // Check if file already exists and has content
    if output_path.exists() {
        let metadata = fs::metadata(&output_path)?;
        if metadata.len() > 0 {
            tracing::info!("Model already cached: {:?}", output_path);
            return Ok(output_path);
        }
    }

    let download_url = resolve_url(config);
    tracing::info!("Downloading from: {}", download_url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600)) // 1 hour timeout for large models
        .build()
        .map_err(|e| StorageError::Download(e.to_string()))?;

    let mut response = client
        .get(&download_url)
        .header("User-Agent", "locachat/0.1.0")
        .send()
        .await
        .map_err(|e| StorageError::Download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(StorageError::Download(format!(
            "HTTP status {}",
            response.status()
        )));
    }

    let total_size = response
        .content_length()
        .ok_or_else(|| StorageError::Download("Could not determine file size".to_string()))?;

    tracing::info!("File size: {} bytes ({})", total_size, format_size(total_size));

    // Write to temp file first
    let mut temp_file = File::create(&temp_path).await?;

    let mut downloaded: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| StorageError::Download(e.to_string()))?
    {
        temp_file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress_callback(downloaded, total_size);
    }
    temp_file.flush().await?;

    if downloaded != total_size {
        return Err(StorageError::Download(format!(
            "incomplete: got {} bytes, expected {}",
            downloaded, total_size
        )));
    }

    // Rename temp file to final location (atomic operation)
    fs::rename(&temp_path, &output_path)?;

    tracing::info!("Download complete: {:?}", output_path);

    Ok(output_path)
}

/// Get a human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_default_config() {
        let config = ModelConfig::default();
        assert_eq!(
            resolve_url(&config),
            "https://huggingface.co/Qwen/Qwen2.5-1.5B-Instruct-GGUF/resolve/main/qwen2.5-1.5b-instruct-q4_k_m.gguf"
        );
    }

    #[test]
    fn test_sanitize_flattens_paths() {
        assert_eq!(
            sanitize_local_filename("sub/dir/model.gguf").unwrap(),
            "sub__dir__model.gguf"
        );
    }

    #[test]
    fn test_sanitize_strips_query_and_invalid_chars() {
        assert_eq!(
            sanitize_local_filename("model.gguf?download=true").unwrap(),
            "model.gguf"
        );
        assert_eq!(sanitize_local_filename("mo:del.gguf").unwrap(), "mo_del.gguf");
    }

    #[test]
    fn test_sanitize_rejects_empty() {
        assert!(sanitize_local_filename("   ").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
