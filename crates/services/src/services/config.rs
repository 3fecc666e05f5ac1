//! Runtime configuration read from the environment.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "tenxcards-development-secret-change-me!!";
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("JWT_SECRET must be set to at least 32 bytes in production")]
    WeakJwtSecret,
}

/// Settings for the AI flashcard generator.
#[derive(Debug)]
pub struct AiConfig {
    /// Generation is disabled when no key is configured.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_flashcards: usize,
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub session_ttl: Duration,
    pub session_cleanup_interval: Duration,
    pub cookie_secure: bool,
    pub cors_allowed_origins: Vec<String>,
    pub ai: AiConfig,
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";
    pub const DEFAULT_MAX_FLASHCARDS: usize = 20;
    pub const MAX_FLASHCARDS_LIMIT: usize = 50;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let production = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));
        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) if secret.len() >= MIN_JWT_SECRET_LEN => secret,
            _ if production => return Err(ConfigError::WeakJwtSecret),
            Some(secret) => {
                warn!("JWT_SECRET is shorter than {MIN_JWT_SECRET_LEN} bytes");
                secret
            }
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let max_flashcards = parse_or(&get, "AI_MAX_FLASHCARDS", Self::DEFAULT_MAX_FLASHCARDS)?;
        if max_flashcards == 0 || max_flashcards > Self::MAX_FLASHCARDS_LIMIT {
            return Err(ConfigError::Invalid {
                name: "AI_MAX_FLASHCARDS",
                value: max_flashcards.to_string(),
            });
        }

        let session_ttl_hours: u64 = parse_or(&get, "SESSION_TTL_HOURS", 168)?;
        if session_ttl_hours == 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_HOURS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://tenxcards.db".to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 3000)?,
            jwt_secret: SecretString::from(jwt_secret),
            session_ttl: Duration::from_secs(session_ttl_hours * 60 * 60),
            session_cleanup_interval: Duration::from_secs(parse_or(
                &get,
                "SESSION_CLEANUP_INTERVAL_SECS",
                15 * 60,
            )?),
            cookie_secure: parse_or(&get, "COOKIE_SECURE", false)?,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            ai: AiConfig {
                api_key: get("ANTHROPIC_API_KEY").map(SecretString::from),
                model: get("AI_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
                max_flashcards,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<G, T>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
