//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::session::SessionPolicy;

/// API credential for the hosted model (required).
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Model name override.
pub const MODEL_ENV: &str = "ECO_GUIDE_MODEL";
/// Base URL override for the Gemini models endpoint.
pub const BASE_URL_ENV: &str = "ECO_GUIDE_GEMINI_URL";
/// Listening port.
pub const PORT_ENV: &str = "ECO_GUIDE_PORT";
/// Directory served under `/static`.
pub const STATIC_DIR_ENV: &str = "ECO_GUIDE_STATIC_DIR";
/// Per-request timeout for model calls, in seconds.
pub const TIMEOUT_ENV: &str = "ECO_GUIDE_TIMEOUT_SECS";
/// Idle time before a conversation is dropped, in seconds.
pub const SESSION_TTL_ENV: &str = "ECO_GUIDE_SESSION_TTL_SECS";
/// Maximum number of live conversations.
pub const MAX_SESSIONS_ENV: &str = "ECO_GUIDE_MAX_SESSIONS";
/// Consecutive failures that pause a conversation.
pub const CIRCUIT_THRESHOLD_ENV: &str = "ECO_GUIDE_CIRCUIT_THRESHOLD";
/// Pause length after the threshold is hit, in seconds.
pub const CIRCUIT_COOLDOWN_ENV: &str = "ECO_GUIDE_CIRCUIT_COOLDOWN_SECS";
/// Recent exchanges resent with every turn, besides the persona preamble.
pub const HISTORY_TURNS_ENV: &str = "ECO_GUIDE_HISTORY_TURNS";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default number of exchanges kept per conversation.
pub const DEFAULT_HISTORY_TURNS: usize = 20;

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The API credential is absent or blank.
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    /// A variable could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// The base URL does not parse.
    #[error("invalid Gemini base URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Server configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Gemini API key.
    pub api_key: String,
    /// Gemini model name.
    pub model: String,
    /// Gemini models endpoint.
    pub base_url: String,
    /// Listening port.
    pub port: u16,
    /// Directory served under `/static` (scripts and other UI assets).
    pub static_dir: PathBuf,
    /// Per-request timeout for model calls.
    pub request_timeout: Duration,
    /// Conversation expiry and failure policy.
    pub session: SessionPolicy,
    /// Recent exchanges resent with every turn.
    pub history_turns: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let defaults = SessionPolicy::default();
        let session = SessionPolicy {
            idle_ttl: parse_or(&lookup, SESSION_TTL_ENV, defaults.idle_ttl.as_secs())
                .map(Duration::from_secs)?,
            max_sessions: parse_or(&lookup, MAX_SESSIONS_ENV, defaults.max_sessions)?,
            failure_threshold: parse_or(&lookup, CIRCUIT_THRESHOLD_ENV, defaults.failure_threshold)?,
            cooldown: parse_or(&lookup, CIRCUIT_COOLDOWN_ENV, defaults.cooldown.as_secs())
                .map(Duration::from_secs)?,
        };

        let config = Self {
            api_key,
            model: lookup(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            port: parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?,
            static_dir: lookup(STATIC_DIR_ENV).map_or_else(|| PathBuf::from("static"), PathBuf::from),
            request_timeout: parse_or(&lookup, TIMEOUT_ENV, 120_u64).map(Duration::from_secs)?,
            session,
            history_turns: parse_or(&lookup, HISTORY_TURNS_ENV, DEFAULT_HISTORY_TURNS)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges.
    ///
    /// # Errors
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url)?;

        if self.model.trim().is_empty() {
            return Err(invalid(MODEL_ENV, &self.model));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid(TIMEOUT_ENV, "0"));
        }
        if self.session.max_sessions == 0 {
            return Err(invalid(MAX_SESSIONS_ENV, "0"));
        }
        if self.session.failure_threshold == 0 {
            return Err(invalid(CIRCUIT_THRESHOLD_ENV, "0"));
        }
        if self.session.idle_ttl.is_zero() {
            return Err(invalid(SESSION_TTL_ENV, "0"));
        }
        if self.history_turns == 0 {
            return Err(invalid(HISTORY_TURNS_ENV, "0"));
        }
        Ok(())
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));

        let blank = AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "   ")]));
        assert!(matches!(blank, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "secret")]))
            .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.session.max_sessions, 1024);
        assert_eq!(config.history_turns, DEFAULT_HISTORY_TURNS);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (API_KEY_ENV, "secret"),
            (MODEL_ENV, "gemini-1.5-flash"),
            (PORT_ENV, "8080"),
            (SESSION_TTL_ENV, "60"),
            (CIRCUIT_THRESHOLD_ENV, "2"),
            (HISTORY_TURNS_ENV, "5"),
        ]))
        .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.port, 8080);
        assert_eq!(config.session.idle_ttl, Duration::from_secs(60));
        assert_eq!(config.session.failure_threshold, 2);
        assert_eq!(config.history_turns, 5);
    }

    #[test]
    fn test_rejects_malformed_values() {
        let port = AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "k"), (PORT_ENV, "http")]));
        assert!(matches!(port, Err(ConfigError::Invalid { key: PORT_ENV, .. })));

        let threshold =
            AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "k"), (CIRCUIT_THRESHOLD_ENV, "0")]));
        assert!(matches!(
            threshold,
            Err(ConfigError::Invalid { key: CIRCUIT_THRESHOLD_ENV, .. })
        ));

        let url = AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "k"), (BASE_URL_ENV, "not a url")]));
        assert!(matches!(url, Err(ConfigError::Url(_))));

        let turns = AppConfig::from_lookup(lookup_from(&[(API_KEY_ENV, "k"), (HISTORY_TURNS_ENV, "0")]));
        assert!(matches!(
            turns,
            Err(ConfigError::Invalid { key: HISTORY_TURNS_ENV, .. })
        ));
    }
}
