//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BENTO_API_BASE_URL` - Backend root including the `/api` prefix
//!
//! ## Optional
//! - `BENTO_PROFILE_DIR` - Directory holding the session file (default: .bento)
//! - `BENTO_POLL_INTERVAL_SECS` - Order board refresh interval (default: 30)
//! - `BENTO_MIGRATION_TIMEOUT_MS` - How long login waits for cart migration (default: 500)
//! - `BENTO_MIGRATION_STRATEGY` - `replay` or `server` (default: replay)
//! - `BENTO_SEARCH_DEBOUNCE_MS` - Debounce window for search and date input (default: 500)
//! - `BENTO_SOUND_FILE` - Notification sound asset
//! - `BENTO_SOUND_PLAYER` - Command used to play the sound asset
//! - `BENTO_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 15)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_PROFILE_DIR: &str = ".bento";
const SESSION_FILE: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// How a guest cart is moved into the user cart at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationStrategy {
    /// Read the guest cart and add every line to the user cart.
    #[default]
    Replay,
    /// Ask the backend to merge the carts in one call.
    Server,
}

impl MigrationStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for MigrationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replay" => Ok(Self::Replay),
            "server" => Ok(Self::Server),
            other => Err(format!("expected 'replay' or 'server', got '{other}'")),
        }
    }
}

/// Notification sound settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundConfig {
    /// Sound asset to play for new orders.
    pub file: Option<PathBuf>,
    /// External player command, invoked as `<player> <file>`.
    pub player: Option<String>,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root; always ends with `/` so relative paths join under it.
    pub api_base_url: Url,
    pub profile_dir: PathBuf,
    pub poll_interval: Duration,
    pub migration_timeout: Duration,
    pub migration_strategy: MigrationStrategy,
    pub search_debounce: Duration,
    pub sound: SoundConfig,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let api_base_url = parse_base_url(&env.required("BENTO_API_BASE_URL")?)?;
        let profile_dir = PathBuf::from(env.or_default("BENTO_PROFILE_DIR", DEFAULT_PROFILE_DIR));
        let poll_interval = Duration::from_secs(env.parsed("BENTO_POLL_INTERVAL_SECS", 30)?);
        let migration_timeout =
            Duration::from_millis(env.parsed("BENTO_MIGRATION_TIMEOUT_MS", 500)?);
        let search_debounce = Duration::from_millis(env.parsed("BENTO_SEARCH_DEBOUNCE_MS", 500)?);
        let request_timeout = Duration::from_secs(env.parsed("BENTO_REQUEST_TIMEOUT_SECS", 15)?);
        let migration_strategy = env
            .optional("BENTO_MIGRATION_STRATEGY")
            .map(|s| s.parse::<MigrationStrategy>())
            .transpose()
            .map_err(|e| ConfigError::InvalidEnvVar("BENTO_MIGRATION_STRATEGY".to_string(), e))?
            .unwrap_or_default();

        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "BENTO_POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let sound = SoundConfig {
            file: env.optional("BENTO_SOUND_FILE").map(PathBuf::from),
            player: env.optional("BENTO_SOUND_PLAYER"),
        };

        Ok(Self {
            api_base_url,
            profile_dir,
            poll_interval,
            migration_timeout,
            migration_strategy,
            search_debounce,
            sound,
            request_timeout,
        })
    }

    /// Path of the persisted session file.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.profile_dir.join(SESSION_FILE)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("BENTO_API_BASE_URL".to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "BENTO_API_BASE_URL".to_string(),
            "must be an http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get a required variable. Blank values count as missing.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        self.optional(key).map_or(Ok(default), |v| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("BENTO_API_BASE_URL", "http://localhost:8000/api")]).expect("valid");
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.migration_timeout, Duration::from_millis(500));
        assert_eq!(config.search_debounce, Duration::from_millis(500));
        assert_eq!(config.migration_strategy, MigrationStrategy::Replay);
        assert_eq!(config.session_file(), PathBuf::from(".bento/session.json"));
        assert_eq!(config.sound, SoundConfig::default());
    }

    #[test]
    fn test_missing_base_url() {
        let err = config(&[]).expect_err("base url required");
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "BENTO_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = config(&[
            ("BENTO_API_BASE_URL", "http://localhost/api"),
            ("BENTO_POLL_INTERVAL_SECS", "often"),
        ])
        .expect_err("non-numeric interval");
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "BENTO_POLL_INTERVAL_SECS"));

        let err = config(&[
            ("BENTO_API_BASE_URL", "http://localhost/api"),
            ("BENTO_MIGRATION_STRATEGY", "merge"),
        ])
        .expect_err("unknown strategy");
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "BENTO_MIGRATION_STRATEGY"));
    }

    #[test]
    fn test_server_strategy_and_sound() {
        let config = config(&[
            ("BENTO_API_BASE_URL", "https://bento.example/api/"),
            ("BENTO_MIGRATION_STRATEGY", "Server"),
            ("BENTO_SOUND_FILE", "/usr/share/sounds/bell.wav"),
            ("BENTO_SOUND_PLAYER", "aplay"),
        ])
        .expect("valid");
        assert_eq!(config.migration_strategy, MigrationStrategy::Server);
        assert_eq!(config.api_base_url.as_str(), "https://bento.example/api/");
        assert_eq!(config.sound.player.as_deref(), Some("aplay"));
    }
}
