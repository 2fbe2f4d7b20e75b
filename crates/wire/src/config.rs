//! Agent configuration: explicit construction or `CLARITY_*` environment
//! variables, with documented defaults and best-effort clamping rather than
//! hard failures on a malformed value.

use std::env;
use std::time::Duration;

/// Tunables recognized by the core. Unknown environment variables are
/// ignored; malformed values fall back to the default rather than failing
/// startup, matching the rest of this crate's "anomalies are data, not
/// errors" stance.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum contiguous time the backfill loop may hold the foreground.
    pub time_to_yield: Duration,
    /// Maximum serialized payload size, in bytes, per batch.
    pub batch_limit: usize,
    /// Whether to run shadow-vs-live consistency checks and emit
    /// diagnostics for divergence.
    pub validate_consistency: bool,
    pub upload_url: Option<String>,
    pub sensitive_attributes: Vec<String>,
    pub show_text: bool,
    pub show_images: bool,
}

const DEFAULT_TIME_TO_YIELD_MS: u64 = 50;
const MIN_TIME_TO_YIELD_MS: u64 = 1;
const MAX_TIME_TO_YIELD_MS: u64 = 1_000;

const DEFAULT_BATCH_LIMIT: usize = 64 * 1024;
const MIN_BATCH_LIMIT: usize = 1024;
const MAX_BATCH_LIMIT: usize = 16 * 1024 * 1024;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            time_to_yield: Duration::from_millis(DEFAULT_TIME_TO_YIELD_MS),
            batch_limit: DEFAULT_BATCH_LIMIT,
            validate_consistency: true,
            upload_url: None,
            sensitive_attributes: Vec::new(),
            show_text: true,
            show_images: true,
        }
    }
}

impl AgentConfig {
    /// Builds a config from `CLARITY_*` environment variables, falling back
    /// to defaults (and clamping to a sane range) for anything missing or
    /// unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            time_to_yield: Duration::from_millis(
                env_u64("CLARITY_TIME_TO_YIELD_MS")
                    .map(|ms| ms.clamp(MIN_TIME_TO_YIELD_MS, MAX_TIME_TO_YIELD_MS))
                    .unwrap_or(DEFAULT_TIME_TO_YIELD_MS),
            ),
            batch_limit: env_usize("CLARITY_BATCH_LIMIT")
                .map(|bytes| bytes.clamp(MIN_BATCH_LIMIT, MAX_BATCH_LIMIT))
                .unwrap_or(DEFAULT_BATCH_LIMIT),
            validate_consistency: env_bool("CLARITY_VALIDATE_CONSISTENCY")
                .unwrap_or(defaults.validate_consistency),
            upload_url: env::var("CLARITY_UPLOAD_URL").ok(),
            sensitive_attributes: env::var("CLARITY_SENSITIVE_ATTRIBUTES")
                .ok()
                .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            show_text: env_bool("CLARITY_SHOW_TEXT").unwrap_or(defaults.show_text),
            show_images: env_bool("CLARITY_SHOW_IMAGES").unwrap_or(defaults.show_images),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|raw| raw.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|raw| raw.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|raw| match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AgentConfig::default();
        assert!(config.validate_consistency);
        assert!(config.batch_limit >= MIN_BATCH_LIMIT);
    }

    #[test]
    fn malformed_bool_falls_back_to_default() {
        assert_eq!(env_bool("CLARITY_DOES_NOT_EXIST_XYZ"), None);
    }
}
