pub mod auth;
pub mod board;
pub mod chat;
pub mod list;

use crate::config::OrgboardConfig;
use anyhow::{Context as _, Result};
use orgboard_sdk::{ApiClient, FileSessionStore, Session, SessionEvent};
use tokio::sync::broadcast;

/// Everything a command needs: parsed config, the on-disk session and a client bound to it.
pub struct Context {
    pub config_path: String,
    pub config: OrgboardConfig,
    pub session: Session,
    pub api: ApiClient,
    pub json: bool,
    session_events: broadcast::Receiver<SessionEvent>,
}

impl Context {
    pub fn new(config_path: &str, json: bool) -> Result<Self> {
        let config = OrgboardConfig::load_optional(config_path)?.unwrap_or_default();
        let store = FileSessionStore::open_default().context("Failed to locate session file")?;
        let session = Session::new(store);
        let session_events = session.subscribe();
        let api = ApiClient::new(&config.client_config(), session.clone())
            .context("Invalid server configuration")?;

        Ok(Self {
            config_path: config_path.to_string(),
            config,
            session,
            api,
            json,
            session_events,
        })
    }

    pub fn require_sign_in(&self) -> Result<()> {
        if !self.session.is_signed_in() {
            anyhow::bail!("Not signed in. Run 'ob auth login' first.");
        }
        Ok(())
    }

    /// True when a request was rejected with 401 during this run.
    pub fn sign_in_required(&mut self) -> bool {
        let mut required = false;
        while let Ok(event) = self.session_events.try_recv() {
            if event == SessionEvent::SignInRequired {
                required = true;
            }
        }
        required
    }
}
