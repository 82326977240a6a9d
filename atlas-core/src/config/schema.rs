//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::session::{CHATS_KEY, DEMO_CHATS_KEY};

/// Root configuration for Planet Atlas
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where assistant replies come from
    #[serde(default)]
    pub reply: ReplyConfig,
    /// Session persistence
    #[serde(default)]
    pub storage: StorageConfig,
    /// Chat backend server
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat-completions upstream used by the backend
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Slot key the session list is stored under
    pub fn storage_key(&self) -> String {
        self.storage
            .key
            .clone()
            .unwrap_or_else(|| self.reply.mode.default_storage_key().to_string())
    }
}

/// Reply source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Canned demo replies after a random delay
    Simulated,
    /// HTTP call to the chat backend
    #[default]
    Remote,
}

impl ReplyMode {
    pub fn default_storage_key(self) -> &'static str {
        match self {
            ReplyMode::Simulated => DEMO_CHATS_KEY,
            ReplyMode::Remote => CHATS_KEY,
        }
    }
}

/// Reply source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    #[serde(default)]
    pub mode: ReplyMode,
    /// Chat endpoint for remote mode
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Lower bound of the simulated reply delay
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound of the simulated reply delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/api/chat".to_string()
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    2500
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            mode: ReplyMode::default(),
            endpoint: default_endpoint(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the key-value slots
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    /// Overrides the mode-derived slot key
    #[serde(default)]
    pub key: Option<String>,
}

fn default_storage_dir() -> String {
    "~/.planet-atlas/data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            key: None,
        }
    }
}

/// Chat backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Built frontend served for non-API paths
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> String {
    "frontend/dist".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// OpenAI-compatible chat-completions upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_api_key() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant that can answer geography questions.".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: default_api_key(),
            model: default_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.planet-atlas/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
