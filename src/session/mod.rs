//! Chat session state
//!
//! One owned object holds everything the UI gates on: the transcript, the
//! model load state and the generation phase. All transitions live here so
//! the request lifecycle can be tested without a UI, and so every `disabled`
//! attribute derives from a single source of truth instead of scattered
//! enable/disable calls.

pub mod transcript;

pub use transcript::Transcript;

use crate::types::config::DEFAULT_SYSTEM_PROMPT;
use crate::types::message::{Message, Role};
use std::time::Duration;

/// System message appended to the transcript when the model becomes ready
pub const MODEL_READY_MESSAGE: &str =
    "モデルのロードが完了しました。メッセージを入力してください。";

/// Current state of the model
#[derive(Clone, PartialEq, Debug)]
pub enum ModelState {
    NotLoaded,
    Loading,
    Loaded(String),
    Error(String),
}

/// What kind of request, if any, is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Completing,
    Streaming,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    transcript: Transcript,
    model_state: ModelState,
    phase: GenerationPhase,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            model_state: ModelState::NotLoaded,
            phase: GenerationPhase::Idle,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model_state
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.model_state, ModelState::Loaded(_))
    }

    /// Send / stream / text input are usable: model loaded and nothing in flight
    pub fn input_enabled(&self) -> bool {
        self.is_loaded() && self.phase == GenerationPhase::Idle
    }

    /// Load trigger is usable: never loaded successfully and no attempt running
    pub fn load_enabled(&self) -> bool {
        matches!(self.model_state, ModelState::NotLoaded | ModelState::Error(_))
    }

    /// Start a load attempt
    ///
    /// Returns false (and changes nothing) when a load is already running or
    /// has already succeeded, so programmatic re-entry is harmless.
    pub fn begin_load(&mut self) -> bool {
        if !self.load_enabled() {
            return false;
        }
        self.model_state = ModelState::Loading;
        true
    }

    pub fn finish_load(&mut self, model_id: &str) {
        self.model_state = ModelState::Loaded(model_id.to_string());
        self.transcript.push(Role::System, MODEL_READY_MESSAGE);
    }

    pub fn fail_load(&mut self, message: impl Into<String>) {
        self.model_state = ModelState::Error(message.into());
    }

    /// Start a synchronous completion: appends the user message and blocks
    /// further submissions. Returns the trimmed text to send, or None when
    /// the precondition fails (nothing changes in that case).
    pub fn begin_completion(&mut self, input: &str) -> Option<String> {
        let text = self.accept_input(input)?;
        self.phase = GenerationPhase::Completing;
        Some(text)
    }

    /// Start a streaming completion: appends the user message and the empty
    /// in-progress reply it streams into.
    pub fn begin_stream(&mut self, input: &str) -> Option<String> {
        let text = self.accept_input(input)?;
        self.phase = GenerationPhase::Streaming;
        self.transcript.open_reply();
        Some(text)
    }

    fn accept_input(&mut self, input: &str) -> Option<String> {
        let trimmed = input.trim();
        if !self.input_enabled() || trimmed.is_empty() {
            return None;
        }
        let text = trimmed.to_string();
        self.transcript.push(Role::User, text.clone());
        Some(text)
    }

    pub fn finish_completion(&mut self, text: &str, elapsed: Duration) {
        self.transcript.push(Role::Assistant, text);
        self.transcript.push(Role::System, format_elapsed(elapsed));
        self.phase = GenerationPhase::Idle;
    }

    pub fn fail_completion(&mut self, message: &str) {
        self.transcript.push(Role::System, format_error(message));
        self.phase = GenerationPhase::Idle;
    }

    /// Append one streamed fragment to the in-progress reply
    pub fn push_stream_delta(&mut self, delta: &str) {
        self.transcript.extend_reply(delta);
    }

    pub fn finish_stream(&mut self, elapsed: Duration) {
        self.transcript.seal_reply();
        self.transcript.push(Role::System, format_elapsed(elapsed));
        self.phase = GenerationPhase::Idle;
    }

    /// Mid-stream failure: partial text stays visible, the error goes to the
    /// transcript as a system message.
    pub fn fail_stream(&mut self, message: &str) {
        self.transcript.seal_reply();
        self.transcript.push(Role::System, format_error(message));
        self.phase = GenerationPhase::Idle;
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages sent to the engine for one user turn: the fixed system prompt
/// plus the user text
pub fn prompt_messages(user_text: &str) -> Vec<Message> {
    vec![
        Message::new(Role::System, DEFAULT_SYSTEM_PROMPT),
        Message::new(Role::User, user_text),
    ]
}

/// Elapsed-time line, two decimals: `応答時間: 1.23秒`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("応答時間: {:.2}秒", elapsed.as_secs_f64())
}

fn format_error(message: &str) -> String {
    format!("エラー: {message}")
}
