use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Gemini REST endpoint used unless `GEMINI_API_BASE` overrides it.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub log_level: String,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    /// May be empty. A missing key is reported by Gemini itself on first use.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        Ok(RelayConfig {
            common: common_config,
            gemini: GeminiSettings {
                api_key: get_env("GEMINI_API_KEY", ""),
                model: get_env("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                base_url: get_env("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
            },
            log_level: get_env("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Unset and empty variables both yield `default`.
fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_treats_empty_as_unset() {
        env::set_var("RELAY_TEST_GEMINI_MODEL", "");
        assert_eq!(
            get_env("RELAY_TEST_GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            DEFAULT_GEMINI_MODEL
        );

        env::set_var("RELAY_TEST_GEMINI_MODEL", "gemini-1.5-pro");
        assert_eq!(
            get_env("RELAY_TEST_GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            "gemini-1.5-pro"
        );

        env::remove_var("RELAY_TEST_GEMINI_MODEL");
        assert_eq!(
            get_env("RELAY_TEST_GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            DEFAULT_GEMINI_MODEL
        );
    }
}
