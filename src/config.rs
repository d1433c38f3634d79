use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Bluesky API
    pub actor: String,
    pub base_url: String,
    pub posts_limit: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,

    // Database
    pub database_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            actor: required_env("BLUESKY_ACTOR")?,
            base_url: env_or_default("BLUESKY_BASE_URL", "https://public.api.bsky.app/xrpc"),
            posts_limit: parse_env_u32("POSTS_LIMIT", 5)?,
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 10)?),
            max_retries: parse_env_u32("MAX_RETRIES", 3)?,
            backoff: Duration::from_millis(parse_env_u64("BACKOFF_MILLIS", 300)?),
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/bluesky.sqlite",
            )),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actor.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BLUESKY_ACTOR".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "BLUESKY_BASE_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.posts_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "POSTS_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "REQUEST_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn base_config() -> Config {
        Config {
            actor: "example.bsky.social".to_string(),
            base_url: "https://public.api.bsky.app/xrpc".to_string(),
            posts_limit: 5,
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: Duration::from_millis(300),
            database_path: PathBuf::from("./data/bluesky.sqlite"),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_actor() {
        let config = Config {
            actor: String::new(),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = Config {
            posts_limit: 0,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_requires_actor() {
        std::env::remove_var("BLUESKY_ACTOR");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "BLUESKY_ACTOR"));
    }

    #[test]
    #[serial]
    fn test_from_env_applies_defaults() {
        std::env::set_var("BLUESKY_ACTOR", "example.bsky.social");
        std::env::remove_var("POSTS_LIMIT");
        std::env::remove_var("BLUESKY_BASE_URL");
        let config = Config::from_env().expect("config should load");
        assert_eq!(config.posts_limit, 5);
        assert_eq!(config.base_url, "https://public.api.bsky.app/xrpc");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        std::env::remove_var("BLUESKY_ACTOR");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_integer() {
        std::env::set_var("BLUESKY_ACTOR", "example.bsky.social");
        std::env::set_var("POSTS_LIMIT", "not-a-number");
        assert!(Config::from_env().is_err());
        std::env::remove_var("POSTS_LIMIT");
        std::env::remove_var("BLUESKY_ACTOR");
    }
}
