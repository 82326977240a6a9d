//! Configuration validation rules.

use super::schema::{Config, ReplyMode};

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.reply.mode == ReplyMode::Remote && config.reply.endpoint.trim().is_empty() {
        errors.push("reply.endpoint is required when reply.mode is remote".to_string());
    }
    if config.reply.min_delay_ms > config.reply.max_delay_ms {
        errors.push("reply.min_delay_ms must be <= reply.max_delay_ms".to_string());
    }

    if config.storage.dir.trim().is_empty() {
        errors.push("storage.dir must not be empty".to_string());
    }
    if let Some(key) = &config.storage.key {
        if key.trim().is_empty() {
            errors.push("storage.key must not be empty when set".to_string());
        }
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }

    if config.upstream.api_base.trim().is_empty() {
        errors.push("upstream.api_base must not be empty".to_string());
    }
    if config.upstream.model.trim().is_empty() {
        errors.push("upstream.model must not be empty".to_string());
    }

    if !matches!(config.logging.format.to_lowercase().as_str(), "text" | "json") {
        errors.push("logging.format must be text or json".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Config(errors.join("; ")))
    }
}
