//! Backend invocation and reply normalization.
//!
//! - [`engine`]: Runs a prompt on the blocking pool and normalizes the reply
//! - [`cache`]: Single-slot client cache keyed by model name
//! - [`client`]: Model client traits and the Ollama implementation
//! - [`reply`]: Backend reply sum type and its canonical-text normalizer
//! - [`prompt`]: Chat messages and prompt assembly

pub mod cache;
pub mod client;
pub mod engine;
pub mod prompt;
pub mod reply;
