//! UI components
//!
//! All user interface components, built with Dioxus.

pub mod chat;
pub mod components;
pub mod layout;
pub mod status;

pub use layout::Layout;
