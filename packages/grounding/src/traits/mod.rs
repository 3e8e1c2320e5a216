//! Core trait abstractions for the grounding library.
//!
//! Every network collaborator of the pipeline sits behind one of these
//! traits so runs can be driven by real services or by test doubles.

pub mod ai;
pub mod retriever;
pub mod store;
