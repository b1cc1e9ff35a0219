//! Message display components

use crate::types::message::{Message, Role};
use dioxus::prelude::*;

/// One transcript entry, styled by role
///
/// User and assistant entries are bubbles; system entries (load announcement,
/// elapsed time, errors) render as a centered note between them.
#[component]
pub fn MessageBubble(message: Message) -> Element {
    match message.role {
        Role::System => rsx! {
            div { class: "system-message", "{message.content}" }
        },
        Role::User => rsx! {
            div { class: "user-message",
                span { "{message.content}" }
            }
        },
        Role::Assistant => rsx! {
            div { class: "ai-message",
                span { "{message.content}" }
            }
        },
    }
}
