use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::cache::DEFAULT_TTL;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} must be a number")]
    NotANumber(&'static str),
}

/// Runtime settings, read from the environment (and `.env` via `dotenv`).
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL; without it the server keeps data in memory.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    /// Process-wide secret for signing session tokens.
    pub jwt_secret: String,
    /// Base URL of the web client, used in emailed links.
    pub frontend_url: String,
    /// Freshness window of cached task listings.
    pub cache_ttl: Duration,
    /// Outgoing mail relay; `None` unless both `EMAIL_USER` and
    /// `EMAIL_PASSWORD` are set.
    pub smtp: Option<SmtpConfig>,
}

/// SMTP relay settings (`EMAIL_*`). The connection is upgraded with STARTTLS.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Sender address; defaults to `user`.
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let user = non_empty_var("EMAIL_USER");
        let password = non_empty_var("EMAIL_PASSWORD");
        let (user, password) = match (user, password) {
            (Some(user), Some(password)) => (user, password),
            _ => return Ok(None),
        };

        Ok(Some(Self {
            host: non_empty_var("EMAIL_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: parse_var("EMAIL_PORT", 587)?,
            from: non_empty_var("EMAIL_FROM").unwrap_or_else(|| user.clone()),
            user,
            password,
        }))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            server_port: parse_var("SERVER_PORT", 3001)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty())
                .ok_or(ConfigError::Missing("JWT_SECRET"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cache_ttl: Duration::from_secs(parse_var(
                "TASK_CACHE_TTL_SECS",
                DEFAULT_TTL.as_secs(),
            )?),
            smtp: SmtpConfig::from_env()?,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server_host.clone(), self.server_port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::NotANumber(name)),
        Err(_) => Ok(default),
    }
}
