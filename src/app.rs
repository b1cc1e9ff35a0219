//! Root Dioxus application component
//!
//! Builds the session context every component hangs off and mounts the
//! layout.

use std::sync::Arc;

use dioxus::prelude::*;
use tokio::sync::Mutex;

use crate::inference::LlamaEngine;
use crate::session::ChatSession;
use crate::types::config::ModelConfig;
use crate::ui::Layout;

const MAIN_CSS: Asset = asset!("/assets/main.css");

/// Status line shown before any load attempt
const STATUS_IDLE: &str = "モデルをロードしてください";

/// Shared handles for one chat session
///
/// Owned by the root component and handed down through context, so the
/// dispatcher and handlers never reach for globals. The engine sits behind a
/// mutex because a load holds it for the whole pipeline.
#[derive(Clone)]
pub struct SessionContext {
    pub engine: Arc<Mutex<LlamaEngine>>,
    pub config: ModelConfig,
    pub session: Signal<ChatSession>,
    pub status: Signal<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        tracing::info!("Session context initialized");
        Self {
            engine: Arc::new(Mutex::new(LlamaEngine::new())),
            config: ModelConfig::default(),
            session: Signal::new(ChatSession::new()),
            status: Signal::new(STATUS_IDLE.to_string()),
        }
    }
}

#[component]
pub fn App() -> Element {
    let session_context = SessionContext::new();
    use_context_provider(|| session_context);

    rsx! {
        document::Stylesheet { href: MAIN_CSS }
        document::Title { "ローカルLLMチャット" }
        Layout {}
    }
}
