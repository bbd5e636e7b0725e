use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// JSON snapshot holding every link, e.g. "data/links.json"
    pub data_file: PathBuf,

    /// How often the background flusher rewrites the snapshot regardless of
    /// pending visit updates.
    pub autosave_interval: Duration,

    /// Public origin used when building short URLs, e.g. "https://go.example.com".
    /// When unset the origin is derived from the request's Host header.
    /// Never has a trailing slash.
    pub base_url: Option<String>,

    /// Number of links shown on /top when no `limit` is given.
    pub top_default_limit: i64,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8974".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let autosave_secs = std::env::var("AUTOSAVE_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse::<u64>()
            .context("AUTOSAVE_INTERVAL_SECS must be a whole number of seconds")?;

        if autosave_secs == 0 {
            anyhow::bail!("AUTOSAVE_INTERVAL_SECS must be greater than zero");
        }

        let base_url = std::env::var("BASE_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());

        let top_default_limit = std::env::var("TOP_DEFAULT_LIMIT")
            .unwrap_or_else(|_| "50".into())
            .parse::<i64>()
            .unwrap_or(50);

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            data_file: std::env::var("DATA_FILE")
                .unwrap_or_else(|_| "data/links.json".into())
                .into(),
            autosave_interval: Duration::from_secs(autosave_secs),
            base_url,
            top_default_limit,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
