//! AI implementations for the grounding library.
//!
//! This module provides reference implementations of the `Generator` and
//! `Embedder` traits. Users can use these directly or implement their own.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{Gemini, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};
