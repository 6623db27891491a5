//! Runtime configuration for ollama-gateway.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Backend location, streaming cadence and the static model listing live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "ollama-gateway", about = "OpenAI-compatible gateway for a local Ollama backend")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides `server.listen`).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Backend (Ollama) configuration.
    pub backend: BackendConfig,

    /// Streaming emulation settings.
    pub streaming: StreamingConfig,

    /// Models advertised by `GET /v1/models`.
    pub models: Vec<ModelEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            streaming: StreamingConfig::default(),
            models: default_models(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,

    /// Allow cross-origin requests from browser chat UIs.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            cors: true,
        }
    }
}

/// Ollama backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the Ollama HTTP API.
    pub base_url: String,

    /// Model used when a request does not name one.
    pub default_model: String,

    /// Upper bound on a single backend call, in seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "phi4:latest".to_string(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Streaming emulation cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Words per emitted chunk.
    pub chunk_words: usize,

    /// Pause between content chunks in milliseconds.
    pub chunk_delay_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_words: 10,
            chunk_delay_ms: 50,
        }
    }
}

impl StreamingConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// One entry of the static model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub created: u64,
    pub owned_by: String,
}

impl ModelEntry {
    fn ollama(id: &str, created: u64) -> Self {
        Self {
            id: id.to_string(),
            created,
            owned_by: "ollama".to_string(),
        }
    }
}

/// Ollama models advertised out of the box.
pub fn default_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::ollama("phi4:latest", 20250101),
        ModelEntry::ollama("gemma3:latest", 20250526),
        ModelEntry::ollama("phi4-mini-reasoning:latest", 20250730),
        ModelEntry::ollama("smollm:latest", 20250530),
        ModelEntry::ollama("granite3.3:2b", 20250730),
    ]
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend.default_model.is_empty() {
            anyhow::bail!("backend.default_model must not be empty");
        }
        if self.streaming.chunk_words == 0 {
            anyhow::bail!("streaming.chunk_words must be at least 1");
        }
        Ok(())
    }
}
