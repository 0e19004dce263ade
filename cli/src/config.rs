use anyhow::{Context, Result};
use orgboard_sdk::{ChannelConfig, ClientConfig, QueryState, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Contents of `orgboard.toml`. The file is optional; every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgboardConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    /// REST base URL, e.g. `https://orgboard.example.com/api/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Realtime WebSocket URL, e.g. `wss://orgboard.example.com/ws`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            page_size: default_page_size(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_reconnect_delay() -> u64 {
    5
}

impl OrgboardConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: OrgboardConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load config, returning None if file doesn't exist
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.request_timeout_secs == 0 {
            anyhow::bail!("client.request_timeout_secs must be positive");
        }
        if self.client.page_size == 0 {
            anyhow::bail!("client.page_size must be positive");
        }
        if self.client.reconnect_delay_secs == 0 {
            anyhow::bail!("client.reconnect_delay_secs must be positive");
        }
        for (key, url) in [
            ("server.api_url", &self.server.api_url),
            ("server.ws_url", &self.server.ws_url),
        ] {
            if matches!(url.as_deref(), Some(u) if u.trim().is_empty()) {
                anyhow::bail!("{} cannot be empty", key);
            }
        }
        Ok(())
    }

    /// Environment variables first, then the file, then built-in defaults.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if std::env::var("ORGBOARD_API_URL").is_err() {
            if let Some(url) = &self.server.api_url {
                config = config.with_api_url(url);
            }
        }
        if std::env::var("ORGBOARD_WS_URL").is_err() {
            if let Some(url) = &self.server.ws_url {
                config = config.with_ws_url(url);
            }
        }
        config
            .with_request_timeout(Duration::from_secs(self.client.request_timeout_secs))
            .with_channel(
                ChannelConfig::default()
                    .with_reconnect_delay(Duration::from_secs(self.client.reconnect_delay_secs)),
            )
    }

    pub fn initial_query(&self) -> QueryState {
        QueryState::default().with_page_size(self.client.page_size)
    }
}
