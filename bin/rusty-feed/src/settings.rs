//! Runtime settings: `RF_*` environment variables, optionally seeded from `.env`.

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawSettings {
    database_url: String,
    bind_addr: String,
    media_root: String,
    media_url: String,
    auth_secret: Option<String>,
    cors_origins: String,
}

#[derive(Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub media_root: String,
    pub media_url: String,
    pub auth_secret: SecretString,
    /// Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let raw: RawSettings = Config::builder()
            .set_default("database_url", "sqlite:rusty_feed.db")?
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("media_root", "./data/media")?
            .set_default("media_url", "/media")?
            .set_default("cors_origins", "")?
            .add_source(Environment::with_prefix("RF"))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        let Some(secret) = raw.auth_secret.filter(|s| !s.trim().is_empty()) else {
            bail!("RF_AUTH_SECRET must be set");
        };

        Ok(Self {
            database_url: raw.database_url,
            bind_addr: raw.bind_addr,
            media_root: raw.media_root,
            media_url: raw.media_url.trim_end_matches('/').to_string(),
            auth_secret: SecretString::from(secret),
            cors_origins: raw
                .cors_origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}
