//! Local LLM inference
//!
//! Model file validation, the llama-cpp worker engine, and the streaming
//! primitives shared by its event channels.

pub mod engine;
pub mod model;
pub mod streaming;

pub use engine::{
    Completion, EngineError, GenerationParams, LlamaEngine, LoadEvent, LoadedModelInfo, TokenUsage,
};
pub use model::{validate_gguf, GgufMetadata, ModelError, GGUF_MAGIC};
pub use streaming::{recv_async, StreamToken, TokenDecoder};
