//! Data types for the grounding pipeline.

pub mod citation;
pub mod config;
pub mod question;
