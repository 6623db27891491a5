//! ollama-gateway: OpenAI-compatible chat completions over a local Ollama backend.
//!
//! Requests are answered by a single blocking backend call. Whatever shape the
//! backend replies with is normalized into one string, which is either returned
//! whole or re-emitted as a paced stream of `chat.completion.chunk` events so
//! streaming clients see token-by-token delivery.

pub mod config;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod server;
