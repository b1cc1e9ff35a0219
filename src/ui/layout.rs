//! Top-level window layout

use dioxus::prelude::*;

use crate::ui::chat::ChatView;
use crate::ui::status::StatusBar;

/// Single column: title and status header on top, chat log and input below
#[component]
pub fn Layout() -> Element {
    rsx! {
        div { class: "app-container",
            header { class: "app-header",
                h1 { class: "app-title", "ローカルLLMチャット" }
                StatusBar {}
            }
            ChatView {}
        }
    }
}
