//! Chat input with IME-aware Enter handling

use dioxus::prelude::*;

/// Estimate how many rows the textarea needs based on content
fn compute_rows(text: &str) -> usize {
    let newlines = text.chars().filter(|&c| c == '\n').count();
    // Each visual line ~ 70 chars for our input width
    let wrap_lines: usize = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                0
            } else {
                (line.len().saturating_sub(1)) / 70
            }
        })
        .sum();
    let total = newlines + wrap_lines + 1;
    total.clamp(1, 8)
}

/// Whether an Enter keypress should dispatch the message
///
/// Shift+Enter inserts a newline, and Enter during an IME composition
/// confirms the composed characters instead of sending.
fn enter_should_send(shift_held: bool, composing: bool) -> bool {
    !shift_held && !composing
}

#[component]
pub fn ChatInput(
    on_send: EventHandler<String>,
    on_stream: EventHandler<String>,
    enabled: bool,
) -> Element {
    let mut text = use_signal(String::new);
    let mut composing = use_signal(|| false);

    let can_send = enabled && !text().trim().is_empty();

    let handle_keydown = move |evt: KeyboardEvent| {
        if evt.key() == Key::Enter
            && enter_should_send(evt.modifiers().contains(Modifiers::SHIFT), composing())
        {
            evt.prevent_default();
            if enabled && !text().trim().is_empty() {
                on_send.call(text());
                text.set(String::new());
            }
        }
    };

    let rows = compute_rows(&text());

    rsx! {
        div { class: "input-area",
            textarea {
                id: "user-input",
                class: "user-input",
                placeholder: "メッセージを入力...",
                value: "{text}",
                rows: "{rows}",
                oninput: move |evt| text.set(evt.value()),
                onkeydown: handle_keydown,
                oncompositionstart: move |_| composing.set(true),
                oncompositionend: move |_| composing.set(false),
                disabled: !enabled,
            }

            button {
                id: "send-btn",
                class: "send-button",
                disabled: !enabled,
                onclick: move |_| {
                    if can_send {
                        on_send.call(text());
                        text.set(String::new());
                    }
                },
                "送信"
            }

            button {
                id: "stream-btn",
                class: "stream-button",
                disabled: !enabled,
                onclick: move |_| {
                    if can_send {
                        on_stream.call(text());
                        text.set(String::new());
                    }
                },
                "ストリーミング"
            }
        }
        p { class: "input-hint", "Enterで送信、Shift+Enterで改行" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_dispatch_rules() {
        assert!(enter_should_send(false, false));
        assert!(!enter_should_send(true, false));
        assert!(!enter_should_send(false, true));
        assert!(!enter_should_send(true, true));
    }

    #[test]
    fn test_compute_rows() {
        assert_eq!(compute_rows(""), 1);
        assert_eq!(compute_rows("hello"), 1);
        assert_eq!(compute_rows("a\nb\nc"), 3);
        assert_eq!(compute_rows(&"x".repeat(200)), 3);
        // Clamped to 8 even for very long input
        assert_eq!(compute_rows(&"line\n".repeat(30)), 8);
    }
}
