//! Process configuration from the environment (and `.env` when present).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; `None` selects the in-memory stores.
    pub database_url: Option<String>,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub email: EmailConfig,
    pub session_ttl: chrono::Duration,
    pub cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Without an API key outgoing mail is only logged.
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            base_url: "http://localhost:8080".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            email: EmailConfig {
                api_key: None,
                api_url: "https://api.resend.com/emails".to_string(),
                from: "Miliki <no-reply@miliki.app>".to_string(),
            },
            session_ttl: chrono::Duration::days(30),
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Read configuration, loading `.env` first if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to read .env"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: {raw}"))?,
            None => defaults.bind_addr,
        };
        let session_days = match get("SESSION_TTL_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .with_context(|| format!("SESSION_TTL_DAYS must be a positive integer: {raw}"))?,
            None => defaults.session_ttl.num_days(),
        };
        let cache_secs = match get("CACHE_TTL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("CACHE_TTL_SECS must be a whole number: {raw}"))?,
            None => defaults.cache_ttl.as_secs(),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            base_url: get("APP_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            bind_addr,
            email: EmailConfig {
                api_key: get("EMAIL_API_KEY"),
                api_url: get("EMAIL_API_URL").unwrap_or(defaults.email.api_url),
                from: get("EMAIL_FROM").unwrap_or(defaults.email.from),
            },
            session_ttl: chrono::Duration::days(session_days),
            cache_ttl: Duration::from_secs(cache_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.session_ttl, chrono::Duration::days(30));
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = from_pairs(&[
            ("DATABASE_URL", "postgres://localhost/miliki"),
            ("APP_BASE_URL", "https://miliki.example/"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("SESSION_TTL_DAYS", "7"),
            ("CACHE_TTL_SECS", "0"),
            ("EMAIL_API_KEY", "  "),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/miliki"));
        assert_eq!(config.base_url, "https://miliki.example");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.session_ttl.num_days(), 7);
        assert!(config.cache_ttl.is_zero());
        assert!(config.email.api_key.is_none());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(from_pairs(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(from_pairs(&[("SESSION_TTL_DAYS", "-3")]).is_err());
    }
}
