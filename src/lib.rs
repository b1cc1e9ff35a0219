//! locachat library
//!
//! A minimal chat front-end for a locally-run language model: the configured
//! GGUF model is fetched from HuggingFace, loaded through llama.cpp, and
//! driven from a Dioxus desktop UI in either one-shot or streaming mode.

pub mod app;
pub mod inference;
pub mod session;
pub mod storage;
pub mod system;
pub mod types;
pub mod ui;
