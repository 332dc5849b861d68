//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 10 * 60;
pub const MAX_CONFIRM_TIMEOUT_SECS: u64 = 24 * 60 * 60;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "sharegate")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("sharegate.toml"))
}

/// How the listening port is exposed to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// LAN address, no tunnel
    Local,
    #[default]
    Cloudflare,
    Ngrok,
}

impl Transport {
    pub fn label(self) -> &'static str {
        match self {
            Transport::Local => "Local",
            Transport::Cloudflare => "Cloudflare",
            Transport::Ngrok => "ngrok",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSettings {
    /// Seconds a receiver has to confirm before the share is revoked
    pub timeout: u64,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRM_TIMEOUT_SECS,
        }
    }
}

impl ShareSettings {
    pub fn confirm_window(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NgrokSettings {
    /// Falls back to the agent's own config / `NGROK_AUTHTOKEN` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authtoken: Option<String>,
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: Transport,
    pub server: ServerSettings,
    pub share: ShareSettings,
    pub ngrok: NgrokSettings,
}

impl AppConfig {
    /// Validates bounds and rejects unsafe values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.share.timeout > 0,
            "Invalid config: share.timeout must be > 0"
        );
        ensure!(
            self.share.timeout <= MAX_CONFIRM_TIMEOUT_SECS,
            "Invalid config: share.timeout must be <= {MAX_CONFIRM_TIMEOUT_SECS}"
        );
        if let Some(token) = &self.ngrok.authtoken {
            ensure!(
                !token.trim().is_empty(),
                "Invalid config: ngrok.authtoken must not be blank"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("SHAREGATE_").split("_"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> Result<AppConfig> {
    if let Some(transport) = overrides.transport {
        config.transport = transport;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(timeout) = overrides.timeout {
        config.share.timeout = timeout;
    }

    config.validate()?;
    Ok(config)
}
