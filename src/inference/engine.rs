//! Inference engine implementation
//!
//! Core logic for managing llama-cpp context and running inference.
//!
//! # Architecture
//!
//! Since llama-cpp-2 types (`LlamaBackend`, `LlamaModel`, `LlamaContext`)
//! contain raw pointers that are not `Send`, all inference operations run on
//! a dedicated worker thread. The rest of the application communicates with
//! it over channels: a model load reports a sequence of `LoadEvent`s, a
//! synchronous completion delivers one `Completion`, and a streaming
//! completion delivers a sequence of `StreamToken`s. All three are finite,
//! non-restartable event feeds drained cooperatively by the caller.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaChatMessage, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use thiserror::Error;

use crate::inference::model::{validate_gguf, ModelError};
use crate::inference::streaming::{recv_async, StreamToken, TokenDecoder};
use crate::storage::huggingface::download_model;
use crate::types::config::ModelConfig;
use crate::types::message::Message;

/// Share of the load progress fraction assigned to the download phase; the
/// in-memory load fills the remainder.
const DOWNLOAD_WEIGHT: f32 = 0.9;

const STATUS_DOWNLOADING: &str = "モデルをダウンロード中";
const STATUS_LOADING_MEMORY: &str = "モデルをメモリにロード中";

/// Errors that can occur during inference operations
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("Backend not initialized")]
    BackendNotInitialized,

    #[error("No model loaded")]
    NoModelLoaded,

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("Model validation failed: {0}")]
    ModelValidation(String),

    #[error("Failed to create context: {0}")]
    ContextCreate(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Worker thread error: {0}")]
    WorkerError(String),
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::ModelValidation(e.to_string())
    }
}

/// Generation parameters for inference
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Temperature for sampling (0.0 = greedy, higher = more random)
    pub temperature: f32,
    /// Top-k sampling parameter (0 = disabled)
    pub top_k: u32,
    /// Top-p (nucleus) sampling parameter
    pub top_p: f32,
    /// Random seed for sampling (0 = random)
    pub seed: u32,
    /// Context window size
    pub max_context_size: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            seed: 0,
            max_context_size: 4096,
        }
    }
}

/// Model information after loading
#[derive(Debug, Clone)]
pub struct LoadedModelInfo {
    /// Path to the loaded model
    pub path: String,
    /// Vocabulary size
    pub vocab_size: i32,
    /// Embedding dimension
    pub embedding_dim: i32,
    /// Training context length
    pub context_length: u32,
    /// Total parameter count
    pub param_count: u64,
    /// Model size in bytes
    pub size_bytes: u64,
}

/// Events reported while a model load is in progress
///
/// Zero or more `Progress` events with a non-decreasing fraction in [0, 1],
/// then exactly one terminal `Ready` or `Failed`.
#[derive(Debug, Clone)]
pub enum LoadEvent {
    Progress { fraction: f32, status: String },
    Ready(LoadedModelInfo),
    Failed(EngineError),
}

/// Token counts for one completed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Result of a synchronous completion
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Commands sent to the worker thread
enum WorkerCommand {
    Init,
    LoadModel {
        path: PathBuf,
        gpu_layers: u32,
        response_tx: Sender<Result<LoadedModelInfo, EngineError>>,
    },
    Complete {
        messages: Vec<Message>,
        params: GenerationParams,
        response_tx: Sender<Result<Completion, EngineError>>,
    },
    Stream {
        messages: Vec<Message>,
        params: GenerationParams,
        token_tx: Sender<StreamToken>,
    },
    Shutdown,
}

/// The LLM inference engine built on llama-cpp-2
///
/// Uses a dedicated worker thread for all llama-cpp operations since the
/// underlying types are not Send. The worker owns the backend and the model
/// and is the source of truth for whether one is loaded.
pub struct LlamaEngine {
    /// Channel to send commands to the worker thread
    command_tx: Option<Sender<WorkerCommand>>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
    /// Whether the backend is initialized
    initialized: bool,
}

impl LlamaEngine {
    /// Creates a new uninitialized engine
    pub fn new() -> Self {
        Self {
            command_tx: None,
            worker_handle: None,
            initialized: false,
        }
    }

    /// Initializes the llama.cpp backend
    ///
    /// Must be called before loading a model or running inference. Spawns
    /// the worker thread that owns all llama-cpp objects.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }

        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();

        let handle = thread::spawn(move || {
            worker_thread_main(command_rx);
        });

        self.command_tx = Some(command_tx.clone());
        self.worker_handle = Some(handle);

        command_tx
            .send(WorkerCommand::Init)
            .map_err(|e| EngineError::WorkerError(e.to_string()))?;

        self.initialized = true;
        tracing::info!("LlamaEngine worker thread started");
        Ok(())
    }

    /// Returns true if the backend is initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads the configured model, reporting progress over `events`
    ///
    /// Runs the whole pipeline: fetch the GGUF file (cached or downloaded
    /// with byte progress), validate its header, then load it into memory on
    /// the worker thread. Every outcome arrives on the channel; the final
    /// event is always `Ready` or `Failed`.
    pub async fn load(&self, config: ModelConfig, events: Sender<LoadEvent>) {
        if let Err(e) = self.run_load(&config, &events).await {
            tracing::error!("Model load failed: {}", e);
            let _ = events.send(LoadEvent::Failed(e));
        }
    }

    async fn run_load(
        &self,
        config: &ModelConfig,
        events: &Sender<LoadEvent>,
    ) -> Result<(), EngineError> {
        let command_tx = self
            .command_tx
            .as_ref()
            .ok_or(EngineError::BackendNotInitialized)?;

        // Fetch phase: byte progress maps onto [0, DOWNLOAD_WEIGHT]. Only
        // whole-percent changes are forwarded so the UI is not flooded.
        let progress_events = events.clone();
        let last_percent = AtomicU32::new(u32::MAX);
        let path = download_model(config, move |downloaded, total| {
            if total == 0 {
                return;
            }
            let percent = ((downloaded * 100) / total) as u32;
            if last_percent.swap(percent, Ordering::Relaxed) == percent {
                return;
            }
            let fraction = DOWNLOAD_WEIGHT * (downloaded as f32 / total as f32);
            let _ = progress_events.send(LoadEvent::Progress {
                fraction,
                status: STATUS_DOWNLOADING.to_string(),
            });
        })
        .await
        .map_err(|e| EngineError::Download(e.to_string()))?;

        let metadata = validate_gguf(&path)?;
        tracing::debug!(
            "GGUF v{} header ok ({} tensors, {} kv pairs)",
            metadata.version,
            metadata.tensor_count,
            metadata.kv_count
        );

        let _ = events.send(LoadEvent::Progress {
            fraction: DOWNLOAD_WEIGHT,
            status: STATUS_LOADING_MEMORY.to_string(),
        });

        let (response_tx, response_rx) = mpsc::channel();
        command_tx
            .send(WorkerCommand::LoadModel {
                path,
                gpu_layers: config.gpu_layers,
                response_tx,
            })
            .map_err(|e| EngineError::WorkerError(e.to_string()))?;

        let info = recv_async(&response_rx)
            .await
            .ok_or_else(|| EngineError::WorkerError("worker thread gone".to_string()))??;

        let _ = events.send(LoadEvent::Ready(info));
        Ok(())
    }

    /// Runs a single-shot completion
    ///
    /// Returns a receiver that delivers exactly one result with the full
    /// generated text and token usage. If no model is loaded the result is
    /// an error, reported by the worker.
    pub fn complete(
        &self,
        messages: Vec<Message>,
        params: GenerationParams,
    ) -> Result<Receiver<Result<Completion, EngineError>>, EngineError> {
        let command_tx = self
            .command_tx
            .as_ref()
            .ok_or(EngineError::BackendNotInitialized)?;

        let (response_tx, response_rx) = mpsc::channel();
        command_tx
            .send(WorkerCommand::Complete {
                messages,
                params,
                response_tx,
            })
            .map_err(|e| EngineError::WorkerError(e.to_string()))?;

        Ok(response_rx)
    }

    /// Runs a streaming completion
    ///
    /// Returns a receiver of text fragments terminated by `Done` or `Error`.
    /// Dropping the receiver stops generation early.
    pub fn complete_stream(
        &self,
        messages: Vec<Message>,
        params: GenerationParams,
    ) -> Result<Receiver<StreamToken>, EngineError> {
        let command_tx = self
            .command_tx
            .as_ref()
            .ok_or(EngineError::BackendNotInitialized)?;

        let (token_tx, token_rx) = mpsc::channel();
        command_tx
            .send(WorkerCommand::Stream {
                messages,
                params,
                token_tx,
            })
            .map_err(|e| EngineError::WorkerError(e.to_string()))?;

        Ok(token_rx)
    }
}

impl Default for LlamaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LlamaEngine {
    fn drop(&mut self) {
        // Send shutdown command
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(WorkerCommand::Shutdown);
        }
        // Wait for worker thread to finish
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Worker thread main loop
///
/// Owns the LlamaBackend and LlamaModel, processes commands in arrival order.
fn worker_thread_main(command_rx: Receiver<WorkerCommand>) {
    let mut backend: Option<LlamaBackend> = None;
    let mut model: Option<LlamaModel> = None;

    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Init) => match LlamaBackend::init() {
                Ok(b) => {
                    backend = Some(b);
                    tracing::info!("LlamaBackend initialized in worker thread");
                }
                Err(e) => {
                    tracing::error!("Failed to init backend: {}", e);
                }
            },
            Ok(WorkerCommand::LoadModel {
                path,
                gpu_layers,
                response_tx,
            }) => match load_model_on_worker(&backend, &path, gpu_layers) {
                Ok((m, info)) => {
                    model = Some(m);
                    tracing::info!("Model loaded: {}", info.path);
                    let _ = response_tx.send(Ok(info));
                }
                Err(e) => {
                    let _ = response_tx.send(Err(e));
                }
            },
            Ok(WorkerCommand::Complete {
                messages,
                params,
                response_tx,
            }) => {
                let result = match (&backend, &model) {
                    (Some(b), Some(m)) => run_completion(b, m, &messages, &params),
                    _ => Err(EngineError::NoModelLoaded),
                };
                let _ = response_tx.send(result);
            }
            Ok(WorkerCommand::Stream {
                messages,
                params,
                token_tx,
            }) => match (&backend, &model) {
                (Some(b), Some(m)) => {
                    if let Err(e) = run_stream(b, m, &messages, &params, &token_tx) {
                        let _ = token_tx.send(StreamToken::Error(e.to_string()));
                    }
                }
                _ => {
                    let _ = token_tx.send(StreamToken::Error(
                        EngineError::NoModelLoaded.to_string(),
                    ));
                }
            },
            Ok(WorkerCommand::Shutdown) => {
                tracing::info!("Worker thread shutting down");
                break;
            }
            Err(_) => {
                // Channel closed, exit
                tracing::debug!("Command channel closed, worker exiting");
                break;
            }
        }
    }
}

/// Load the model and extract its info (worker thread)
fn load_model_on_worker(
    backend: &Option<LlamaBackend>,
    path: &Path,
    gpu_layers: u32,
) -> Result<(LlamaModel, LoadedModelInfo), EngineError> {
    let backend = backend.as_ref().ok_or(EngineError::BackendNotInitialized)?;

    let model_params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers);

    let model = LlamaModel::load_from_file(backend, path, &model_params)
        .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

    let info = LoadedModelInfo {
        path: path.to_string_lossy().to_string(),
        vocab_size: model.n_vocab(),
        embedding_dim: model.n_embd(),
        context_length: model.n_ctx_train(),
        param_count: model.n_params() as u64,
        size_bytes: model.size() as u64,
    };

    tracing::info!(
        "Model info extracted: {} ({} params, {} vocab, {} ctx)",
        info.path,
        info.param_count,
        info.vocab_size,
        info.context_length
    );

    Ok((model, info))
}

/// Run one completion, collecting the full text (worker thread)
fn run_completion(
    backend: &LlamaBackend,
    model: &LlamaModel,
    messages: &[Message],
    params: &GenerationParams,
) -> Result<Completion, EngineError> {
    let mut text = String::new();
    let usage = run_generation(backend, model, messages, params, |piece| {
        text.push_str(piece);
        true
    })?;
    Ok(Completion { text, usage })
}

/// Run one completion, streaming fragments to `tx` (worker thread)
fn run_stream(
    backend: &LlamaBackend,
    model: &LlamaModel,
    messages: &[Message],
    params: &GenerationParams,
    tx: &Sender<StreamToken>,
) -> Result<(), EngineError> {
    let usage = run_generation(backend, model, messages, params, |piece| {
        tx.send(StreamToken::Token(piece.to_string())).is_ok()
    })?;
    tracing::debug!(
        "Stream finished ({} prompt tokens, {} generated)",
        usage.prompt_tokens,
        usage.completion_tokens
    );
    let _ = tx.send(StreamToken::Done);
    Ok(())
}

/// The shared generation loop
///
/// `emit` receives each decoded text fragment; returning false stops
/// generation early (the streaming receiver was dropped).
fn run_generation(
    backend: &LlamaBackend,
    model: &LlamaModel,
    messages: &[Message],
    params: &GenerationParams,
    mut emit: impl FnMut(&str) -> bool,
) -> Result<TokenUsage, EngineError> {
    let prompt = build_chat_prompt(model, messages);

    // Context size from config, capped to what the model was trained for
    let n_ctx = params.max_context_size.min(model.n_ctx_train()).max(2048);

    let ctx_params = LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(n_ctx))
        .with_n_batch(512);

    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| EngineError::ContextCreate(e.to_string()))?;

    let tokens = model
        .str_to_token(&prompt, AddBos::Always)
        .map_err(|e| EngineError::Tokenization(e.to_string()))?;
    let prompt_tokens = tokens.len() as u32;
    tracing::debug!("Tokenized prompt into {} tokens", tokens.len());

    let mut batch = LlamaBatch::new(512, 1);
    for (i, token) in tokens.iter().enumerate() {
        let is_last = i == tokens.len() - 1;
        batch
            .add(*token, i as i32, &[0], is_last)
            .map_err(|e| EngineError::Inference(e.to_string()))?;
    }

    ctx.decode(&mut batch)
        .map_err(|e| EngineError::Inference(e.to_string()))?;

    let mut sampler = build_sampler(params);
    let mut decoder = TokenDecoder::new();
    let mut n_decoded = tokens.len() as i32;
    let mut completion_tokens = 0u32;

    for _ in 0..params.max_tokens {
        let new_token = sampler.sample(&ctx, batch.n_tokens() - 1);
        sampler.accept(new_token);

        if model.is_eog_token(new_token) {
            tracing::debug!("End of generation token encountered");
            break;
        }

        completion_tokens += 1;

        let token_bytes = model
            .token_to_bytes(new_token, Special::Tokenize)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        if let Some(piece) = decoder.push(&token_bytes) {
            if !emit(&piece) {
                tracing::debug!("Receiver dropped, stopping generation");
                break;
            }
        }

        batch.clear();
        batch
            .add(new_token, n_decoded, &[0], true)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        ctx.decode(&mut batch)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        n_decoded += 1;
    }

    if let Some(piece) = decoder.flush() {
        emit(&piece);
    }

    Ok(TokenUsage {
        prompt_tokens,
        completion_tokens,
    })
}

/// Render the message list through the model's chat template, falling back
/// to a plain role-prefixed transcript when the template is unusable
fn build_chat_prompt(model: &LlamaModel, messages: &[Message]) -> String {
    match apply_chat_template(model, messages) {
        Ok(prompt) => prompt,
        Err(error) => {
            tracing::warn!("Chat template not applied: {error}");
            fallback_prompt(messages)
        }
    }
}

fn apply_chat_template(model: &LlamaModel, messages: &[Message]) -> Result<String, String> {
    let template = model
        .chat_template(None)
        .map_err(|e| format!("Failed to load chat template: {e}"))?;
    let chat: Vec<LlamaChatMessage> = messages
        .iter()
        .map(|m| LlamaChatMessage::new(m.role.as_str().to_string(), m.content.clone()))
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to build chat message: {e}"))?;
    model
        .apply_chat_template(&template, &chat, true)
        .map_err(|e| format!("Failed to apply chat template: {e}"))
}

fn fallback_prompt(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        prompt.push_str(message.role.as_str());
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push('\n');
    }
    prompt.push_str("assistant: ");
    prompt
}

fn build_sampler(params: &GenerationParams) -> LlamaSampler {
    if params.temperature < 0.01 {
        // Greedy sampling for very low temperature
        return LlamaSampler::greedy();
    }

    let seed = if params.seed == 0 {
        rand_seed()
    } else {
        params.seed
    };

    LlamaSampler::chain_simple([
        LlamaSampler::top_k(params.top_k as i32),
        LlamaSampler::top_p(params.top_p, 1),
        LlamaSampler::temp(params.temperature),
        LlamaSampler::dist(seed),
    ])
}

/// Generates a random seed using system entropy
fn rand_seed() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::Role;

    #[test]
    fn test_engine_new() {
        let engine = LlamaEngine::new();
        assert!(!engine.is_initialized());
    }

    #[test]
    fn test_generation_params_default() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 1024);
        assert!((params.temperature - 0.7).abs() < 0.001);
        assert_eq!(params.top_k, 40);
        assert!((params.top_p - 0.95).abs() < 0.001);
        assert_eq!(params.max_context_size, 4096);
    }

    #[test]
    fn test_fallback_prompt_keeps_roles_and_order() {
        let messages = vec![
            Message::new(Role::System, "You are a helpful AI assistant."),
            Message::new(Role::User, "Hello"),
        ];
        let prompt = fallback_prompt(&messages);
        assert_eq!(
            prompt,
            "system: You are a helpful AI assistant.\nuser: Hello\nassistant: "
        );
    }

    #[test]
    fn test_complete_requires_init() {
        let engine = LlamaEngine::new();
        let result = engine.complete(Vec::new(), GenerationParams::default());
        assert!(matches!(result, Err(EngineError::BackendNotInitialized)));
    }
}
