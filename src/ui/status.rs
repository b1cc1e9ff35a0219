//! Load status line and model load trigger
//!
//! The status line is overwritten in place as load progress arrives; only
//! the final ready announcement goes to the transcript.

use std::sync::mpsc;

use dioxus::prelude::*;

use crate::app::SessionContext;
use crate::inference::{recv_async, EngineError, LoadEvent};
use crate::session::ModelState;
use crate::ui::components::loading::Spinner;

const STATUS_STARTING: &str = "モデルをロード中...";

#[component]
pub fn StatusBar() -> Element {
    let ctx = use_context::<SessionContext>();

    let load_enabled = ctx.session.read().load_enabled();
    let is_loading = matches!(*ctx.session.read().model_state(), ModelState::Loading);
    let status_text = ctx.status.read().clone();

    let handle_load = {
        let ctx = ctx.clone();
        move |_| {
            let mut ctx = ctx.clone();
            if !ctx.session.write().begin_load() {
                return;
            }
            ctx.status.set(STATUS_STARTING.to_string());

            let (event_tx, event_rx) = mpsc::channel::<LoadEvent>();

            // Producer: initialize the engine on first use, then run the
            // load pipeline with the engine lock held for its duration.
            {
                let ctx = ctx.clone();
                spawn(async move {
                    let mut engine = ctx.engine.lock().await;
                    if !engine.is_initialized() {
                        if let Err(e) = engine.init() {
                            let _ = event_tx.send(LoadEvent::Failed(e));
                            return;
                        }
                    }
                    engine.load(ctx.config.clone(), event_tx).await;
                });
            }

            // Consumer: drain load events into the status line and session
            spawn(async move {
                loop {
                    match recv_async(&event_rx).await {
                        Some(LoadEvent::Progress { fraction, status }) => {
                            let percent = (fraction * 100.0).round() as u32;
                            ctx.status
                                .set(format!("ロード中... {}% - {}", percent, status));
                        }
                        Some(LoadEvent::Ready(info)) => {
                            tracing::info!(
                                "Model ready: {} ({} params, context {})",
                                info.path,
                                info.param_count,
                                info.context_length
                            );
                            ctx.session.write().finish_load(&ctx.config.model_id);
                            ctx.status.set(format!(
                                "モデル「{}」が正常にロードされました",
                                ctx.config.model_id
                            ));
                            break;
                        }
                        Some(LoadEvent::Failed(e)) => {
                            ctx.session.write().fail_load(e.to_string());
                            ctx.status
                                .set(format!("モデルのロードに失敗しました: {}", e));
                            break;
                        }
                        None => {
                            let e = EngineError::WorkerError(
                                "load events channel closed".to_string(),
                            );
                            ctx.session.write().fail_load(e.to_string());
                            ctx.status
                                .set(format!("モデルのロードに失敗しました: {}", e));
                            break;
                        }
                    }
                }
            });
        }
    };

    rsx! {
        div { class: "status-bar",
            if is_loading {
                Spinner { size: 14 }
            }
            span { id: "status", class: "status-text", "{status_text}" }
            button {
                id: "load-btn",
                class: "load-button",
                disabled: !load_enabled,
                onclick: handle_load,
                "モデルをロード"
            }
        }
    }
}
