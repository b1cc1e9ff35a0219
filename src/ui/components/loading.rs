//! Loading indicators

use dioxus::prelude::*;

/// Rotating spinner, sized in pixels
#[component]
pub fn Spinner(size: u32) -> Element {
    rsx! {
        div {
            class: "spinner",
            style: "width: {size}px; height: {size}px;",
        }
    }
}
