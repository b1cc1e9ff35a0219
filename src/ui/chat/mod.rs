//! Chat interface components
//!
//! The transcript log, the input row, and the two generation handlers
//! (one-shot and streaming) that drive the engine.

pub mod input;
pub mod message;

use std::time::Instant;

use dioxus::prelude::*;
use input::ChatInput;
use message::MessageBubble;

use crate::app::SessionContext;
use crate::inference::{recv_async, EngineError, GenerationParams, StreamToken};

#[component]
pub fn ChatView() -> Element {
    let ctx = use_context::<SessionContext>();

    let input_enabled = ctx.session.read().input_enabled();
    let messages = ctx.session.read().transcript().messages().to_vec();

    // Keep the log pinned to the newest entry after every transcript change
    {
        let session = ctx.session;
        use_effect(move || {
            let _ = session.read().transcript().len();
            scroll_to_latest();
        });
    }

    // Handler for the one-shot completion path
    let handle_send = {
        let ctx = ctx.clone();
        move |text: String| {
            let mut ctx = ctx.clone();
            let Some(user_text) = ctx.session.write().begin_completion(&text) else {
                return;
            };

            spawn(async move {
                let params = GenerationParams {
                    max_context_size: ctx.config.context_size,
                    ..GenerationParams::default()
                };
                let messages = crate::session::prompt_messages(&user_text);

                let started = Instant::now();
                let request = {
                    let engine = ctx.engine.lock().await;
                    engine.complete(messages, params)
                };
                let outcome = match request {
                    Ok(rx) => match recv_async(&rx).await {
                        Some(result) => result,
                        None => Err(EngineError::WorkerError(
                            "response channel closed".to_string(),
                        )),
                    },
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(completion) => {
                        tracing::debug!(
                            "Completion done ({} prompt / {} generated tokens)",
                            completion.usage.prompt_tokens,
                            completion.usage.completion_tokens
                        );
                        ctx.session
                            .write()
                            .finish_completion(&completion.text, started.elapsed());
                    }
                    Err(e) => {
                        tracing::error!("Completion failed: {}", e);
                        ctx.session.write().fail_completion(&e.to_string());
                    }
                }
            });
        }
    };

    // Handler for the streaming path
    let handle_stream = {
        let ctx = ctx.clone();
        move |text: String| {
            let mut ctx = ctx.clone();
            let Some(user_text) = ctx.session.write().begin_stream(&text) else {
                return;
            };

            spawn(async move {
                // Same request as the one-shot path except for the sampling
                // temperature, which the streaming path pins to 1.0.
                let params = GenerationParams {
                    temperature: 1.0,
                    max_context_size: ctx.config.context_size,
                    ..GenerationParams::default()
                };
                let messages = crate::session::prompt_messages(&user_text);

                let started = Instant::now();
                let request = {
                    let engine = ctx.engine.lock().await;
                    engine.complete_stream(messages, params)
                };
                let rx = match request {
                    Ok(rx) => rx,
                    Err(e) => {
                        tracing::error!("Stream request failed: {}", e);
                        ctx.session.write().fail_stream(&e.to_string());
                        return;
                    }
                };

                let mut stream_done = false;
                while !stream_done {
                    // Drain all available fragments in one batch to reduce
                    // re-renders
                    let mut batch_text = String::new();
                    let mut got_any = false;
                    let mut failure: Option<String> = None;

                    loop {
                        match rx.try_recv() {
                            Ok(StreamToken::Token(fragment)) => {
                                batch_text.push_str(&fragment);
                                got_any = true;
                            }
                            Ok(StreamToken::Done) => {
                                stream_done = true;
                                break;
                            }
                            Ok(StreamToken::Error(e)) => {
                                failure = Some(e);
                                stream_done = true;
                                break;
                            }
                            Err(std::sync::mpsc::TryRecvError::Empty) => break,
                            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                                stream_done = true;
                                break;
                            }
                        }
                    }

                    if !batch_text.is_empty() {
                        ctx.session.write().push_stream_delta(&batch_text);
                    }

                    if let Some(e) = failure {
                        tracing::error!("Stream failed: {}", e);
                        ctx.session.write().fail_stream(&e);
                        return;
                    }

                    if !stream_done && !got_any {
                        // No fragments available, yield briefly
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    }
                }

                ctx.session.write().finish_stream(started.elapsed());
            });
        }
    };

    rsx! {
        div { id: "chat-log", class: "chat-log",
            for (idx, msg) in messages.iter().enumerate() {
                MessageBubble { key: "{idx}", message: msg.clone() }
            }
        }

        ChatInput {
            on_send: handle_send,
            on_stream: handle_stream,
            enabled: input_enabled,
        }
    }
}

/// Scroll the chat log to its bottom
fn scroll_to_latest() {
    let _ = dioxus::document::eval(
        r#"const el = document.getElementById("chat-log");
if (el) { el.scrollTop = el.scrollHeight; }"#,
    );
}
