use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Realtime channel tuning. Reconnects use a fixed delay with no cap on attempts.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay: Duration::from_secs(5),
            heartbeat_outgoing: Duration::from_secs(10),
            heartbeat_incoming: Duration::from_secs(10),
        }
    }
}

impl ChannelConfig {
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_heartbeats(mut self, outgoing: Duration, incoming: Duration) -> Self {
        self.heartbeat_outgoing = outgoing;
        self.heartbeat_incoming = incoming;
        self
    }

    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub ws_url: String,
    pub request_timeout: Duration,
    pub channel: ChannelConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            channel: ChannelConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `ORGBOARD_API_URL` and `ORGBOARD_WS_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ORGBOARD_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("ORGBOARD_WS_URL") {
            config.ws_url = url;
        }
        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }
}
