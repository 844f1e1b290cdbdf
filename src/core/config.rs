use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{Level, info};

use crate::core::llm::ollama::DEFAULT_OLLAMA_URL;
use crate::core::pipeline::DEFAULT_PREAMBLE_MARKERS;

pub const DEFAULT_CONFIG_FILE: &str = "buildpilot.toml";

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Model identifier passed to the backend, e.g. "mistral" or "llama3:8b"
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Upper bound for a whole backend call, body included. Unset means no limit.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    #[serde(default = "default_preamble_markers")]
    pub preamble_markers: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_model() -> String {
    "mistral".to_string()
}
fn default_ollama_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}
fn default_chunk_delay_ms() -> u64 {
    5
}
fn default_preamble_markers() -> Vec<String> {
    DEFAULT_PREAMBLE_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model: default_model(),
            ollama_url: default_ollama_url(),
            request_timeout_secs: None,
            chunk_delay_ms: default_chunk_delay_ms(),
            preamble_markers: default_preamble_markers(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Read the TOML file (an explicit path must exist; the default one may not),
    /// then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok()).await
    }

    pub async fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Self::from_file(path).await?
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path).await?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BUILDPILOT_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("BUILDPILOT_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("BUILDPILOT_PORT is not a valid port: {}", port))?;
        }
        if let Some(model) = lookup("BUILDPILOT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("OLLAMA_HOST") {
            self.ollama_url = normalize_backend_url(&url);
        }
        if let Some(level) = lookup("BUILDPILOT_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// Ollama accepts `host:port` in `OLLAMA_HOST`; the client needs a full URL.
pub fn normalize_backend_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    }
}
