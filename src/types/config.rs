//! Configuration types
//!
//! The model configuration is a code-level literal: there is no settings
//! file and nothing is user-editable at runtime.

use crate::system::gpu::default_gpu_layers;
use serde::{Deserialize, Serialize};

/// System prompt prepended to every request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Which model to run and how to fetch it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Display name shown in status messages
    pub model_id: String,
    /// HuggingFace repository holding the GGUF file
    pub repo_id: String,
    /// GGUF filename within the repository
    pub filename: String,
    /// Repository revision
    pub revision: String,
    /// Context window size in tokens
    pub context_size: u32,
    /// Number of layers to offload to GPU (0 = CPU only)
    pub gpu_layers: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "Qwen2.5-1.5B-Instruct".to_string(),
            repo_id: "Qwen/Qwen2.5-1.5B-Instruct-GGUF".to_string(),
            filename: "qwen2.5-1.5b-instruct-q4_k_m.gguf".to_string(),
            revision: "main".to_string(),
            context_size: 4096,
            gpu_layers: default_gpu_layers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelConfig::default();
        assert_eq!(config.model_id, "Qwen2.5-1.5B-Instruct");
        assert_eq!(config.context_size, 4096);
        assert_eq!(config.revision, "main");
        assert!(config.filename.ends_with(".gguf"));
    }

    #[test]
    fn test_config_serialization() {
        let config = ModelConfig::default();
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        let deserialized: ModelConfig = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config.context_size, deserialized.context_size);
        assert_eq!(config.repo_id, deserialized.repo_id);
    }
}
