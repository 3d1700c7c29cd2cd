//! Configuration loading.
//!
//! Two optional JSON files, each silently defaulted when absent or malformed:
//! `config/core.json` (expansion bound) and `config/llm/default.json` (chat
//! bridge). Negative numbers are rejected in favor of the field default
//! rather than clamped to zero.

use serde::Deserialize;
use std::path::Path;

const DEFAULT_EXPAND_MAX_PASSES: u32 = 10;

/// Core dispatcher configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub expand_max_passes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            expand_max_passes: DEFAULT_EXPAND_MAX_PASSES as usize,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCoreConfig {
    expand_max_passes: Option<i64>,
}

impl CoreConfig {
    /// Load from `path`; missing or unparsable file yields defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        Self::load_from_str(&content)
    }

    fn load_from_str(content: &str) -> Self {
        let raw: RawCoreConfig = match serde_json::from_str(content) {
            Ok(r) => r,
            Err(_) => return Self::default(),
        };
        let mut cfg = Self::default();
        if let Some(n) = raw.expand_max_passes {
            if n > 0 {
                cfg.expand_max_passes = n as usize;
            }
        }
        cfg
    }
}

const DEFAULT_LLM_TIMEOUT_MS: u64 = 8000;
const DEFAULT_LLM_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_LLM_MODEL: &str = "llama3.1:8b";

/// LLM chat bridge configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub model: String,
}

#[derive(Debug, Deserialize)]
struct RawLlmConfig {
    base_url: Option<String>,
    timeout_ms: Option<i64>,
    poll_interval_ms: Option<i64>,
    model: Option<String>,
}

impl LlmConfig {
    /// Load from `path`. `base_url` is required; a missing/empty value or an
    /// unreadable/malformed file is an error surfaced at first use, not at
    /// startup (mirrors the lazily-constructed Q singleton).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> crate::error::ShellResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ShellError::Internal(format!(
                "Q config missing: {} ({e})",
                path.display()
            ))
        })?;
        let raw: RawLlmConfig = serde_json::from_str(&content).map_err(|e| {
            crate::error::ShellError::Internal(format!("Q config invalid: {e}"))
        })?;

        let base_url = raw.base_url.unwrap_or_default().trim().to_string();
        if base_url.is_empty() {
            return Err(crate::error::ShellError::Internal(
                "config.base_url missing/empty".to_string(),
            ));
        }

        let timeout_ms = raw
            .timeout_ms
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_MS);
        let poll_interval_ms = raw
            .poll_interval_ms
            .filter(|v| *v >= 0)
            .map(|v| v as u64)
            .unwrap_or(DEFAULT_LLM_POLL_INTERVAL_MS);
        let model = raw
            .model
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms,
            poll_interval_ms,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_core_config_defaults() {
        let cfg = CoreConfig::load_from_file("does/not/exist.json");
        assert_eq!(cfg.expand_max_passes, 10);
    }

    #[test]
    fn core_config_rejects_negative() {
        let cfg = CoreConfig::load_from_str(r#"{"expand_max_passes": -3}"#);
        assert_eq!(cfg.expand_max_passes, 10);
    }

    #[test]
    fn core_config_honors_positive() {
        let cfg = CoreConfig::load_from_str(r#"{"expand_max_passes": 3}"#);
        assert_eq!(cfg.expand_max_passes, 3);
    }
}
