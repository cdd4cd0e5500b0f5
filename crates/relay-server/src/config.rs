use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use relay_core::EngineConfig;
use relay_core::broadcast::{DEFAULT_MAX_REPORTED_FAILURES, DEFAULT_SEND_DELAY};

/// Secrets shipped in sample `.env` files. Refuse to start with any of them.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub owner_id: i64,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("RELAY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RELAY_JWT_SECRET is unset or still a placeholder; it must match the identity provider's secret");
        }

        let owner_id: i64 = get("RELAY_OWNER_ID")
            .context("RELAY_OWNER_ID must be set")?
            .parse()
            .context("RELAY_OWNER_ID must be an integer user id")?;

        let db_path = get("RELAY_DB_PATH").unwrap_or_else(|| "relay.db".into()).into();
        let host = get("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("RELAY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("RELAY_PORT must be a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let send_delay = match get("RELAY_SEND_DELAY_MS") {
            Some(ms) => Duration::from_millis(ms.parse().context("RELAY_SEND_DELAY_MS must be milliseconds")?),
            None => DEFAULT_SEND_DELAY,
        };
        let max_reported_failures = match get("RELAY_MAX_REPORTED_FAILURES") {
            Some(n) => n.parse().context("RELAY_MAX_REPORTED_FAILURES must be a count")?,
            None => DEFAULT_MAX_REPORTED_FAILURES,
        };

        Ok(Self {
            db_path,
            addr,
            jwt_secret,
            owner_id,
            engine: EngineConfig {
                send_delay,
                max_reported_failures,
            },
        })
    }
}
