//! Configuration loading
//!
//! `config.json` is read as a JSON document, environment overrides are
//! written into that document, and the result is deserialized with every
//! missing field taking its schema default.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::schema::Config;
use super::validate::validate_config;
use crate::utils::ensure_dir;

const CONFIG_FILE: &str = "config.json";

/// Prefix of path overrides: `PLANET_ATLAS__SERVER__PORT=9000`
const ENV_PREFIX: &str = "PLANET_ATLAS__";

/// Conventional variables mapped onto config paths
const ENV_ALIASES: &[(&str, &[&str])] = &[
    ("OPENAI_API_KEY", &["upstream", "api_key"]),
    ("OPENAI_BASE_URL", &["upstream", "api_base"]),
    ("PLANET_ATLAS_ENDPOINT", &["reply", "endpoint"]),
];

/// Reads and writes `config.json` in a config directory
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for `~/.planet-atlas/config.json`
    pub fn new() -> Self {
        Self::with_dir(dirs::home_dir().unwrap_or_default().join(".planet-atlas"))
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the configuration
    pub fn load(&self) -> crate::Result<Config> {
        self.load_with(|_| {})
    }

    /// Load the configuration, letting `adjust` apply command-line choices
    /// before validation runs.
    pub fn load_with(&self, adjust: impl FnOnce(&mut Config)) -> crate::Result<Config> {
        let mut document = self.read_document()?;
        for (path, value) in env_overrides(std::env::vars()) {
            set_path_value(&mut document, &path, value);
        }

        let mut config: Config = serde_json::from_value(document)?;
        adjust(&mut config);
        validate_config(&config)?;
        Ok(config)
    }

    /// Write `config` as pretty JSON, creating the directory if needed
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        if let Some(dir) = self.path.parent() {
            ensure_dir(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }

    fn read_document(&self) -> crate::Result<Value> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Overrides found in `vars`, aliases first so prefixed paths win
fn env_overrides(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(Vec<String>, Value)> {
    let mut aliased = Vec::new();
    let mut prefixed = Vec::new();

    for (key, raw) in vars {
        if let Some((_, path)) = ENV_ALIASES.iter().find(|(name, _)| *name == key) {
            let path = path.iter().map(|s| s.to_string()).collect();
            aliased.push((path, Value::String(raw)));
        } else if let Some(suffix) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<String> = suffix
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            if !path.is_empty() {
                prefixed.push((path, parse_env_value(&raw)));
            }
        }
    }

    aliased.extend(prefixed);
    aliased
}

/// JSON when it parses (`9000`, `true`, `["a"]`), a plain string otherwise
fn parse_env_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_path_value(root: &mut Value, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *root = value;
        return;
    };
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(map) = root {
        set_path_value(map.entry(first.clone()).or_insert(Value::Null), rest, value);
    }
}
