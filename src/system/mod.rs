//! System utilities
//!
//! Compile-time GPU backend selection and its runtime defaults.

pub mod gpu;
