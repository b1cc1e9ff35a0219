//! GPU acceleration support
//!
//! The llama.cpp backend is selected at compile time through cargo features;
//! this module turns that choice into runtime defaults.

/// Name of the compiled acceleration backend, for logging
pub fn backend_name() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "metal") {
        "Metal"
    } else {
        "CPU"
    }
}

/// Whether an acceleration backend was compiled in
pub fn gpu_available() -> bool {
    cfg!(any(feature = "cuda", feature = "vulkan", feature = "metal"))
}

/// Default number of model layers to offload to the GPU
///
/// 99 offloads every layer of any model we ship; llama.cpp clamps the count
/// to the model's actual layer count.
pub fn default_gpu_layers() -> u32 {
    if gpu_available() {
        99
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_match_backend() {
        if gpu_available() {
            assert_eq!(default_gpu_layers(), 99);
        } else {
            assert_eq!(default_gpu_layers(), 0);
        }
    }

    #[test]
    fn test_backend_name_nonempty() {
        assert!(!backend_name().is_empty());
    }
}
