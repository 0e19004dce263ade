//! Bearer token and "last visited board" persistence.
//!
//! The token is read from the store on every request and on every channel
//! (re)connect, so a token replaced mid-session is picked up without
//! restarting anything.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub trait SessionStore: Send + Sync {
    fn load_token(&self) -> Option<String>;
    fn save_token(&self, token: &str) -> Result<(), StoreError>;
    fn clear_token(&self) -> Result<(), StoreError>;
    fn last_board(&self) -> Option<String>;
    fn save_last_board(&self, board_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SessionEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_board: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<SessionEntries>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(SessionEntries {
                token: Some(token.into()),
                last_board: None,
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, SessionEntries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn load_token(&self) -> Option<String> {
        self.entries().token.clone()
    }

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        self.entries().token = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        self.entries().token = None;
        Ok(())
    }

    fn last_board(&self) -> Option<String> {
        self.entries().last_board.clone()
    }

    fn save_last_board(&self, board_id: &str) -> Result<(), StoreError> {
        self.entries().last_board = Some(board_id.to_string());
        Ok(())
    }
}

/// Plain key/value TOML file, `~/.orgboard/session.toml` by default.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(home.join(".orgboard").join("session.toml"))
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<SessionEntries, StoreError> {
        if !self.path.exists() {
            return Ok(SessionEntries::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn write(&self, entries: &SessionEntries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string(entries)?)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut SessionEntries)) -> Result<(), StoreError> {
        let mut entries = self.read()?;
        apply(&mut entries);
        self.write(&entries)
    }
}

impl SessionStore for FileSessionStore {
    fn load_token(&self) -> Option<String> {
        match self.read() {
            Ok(entries) => entries.token,
            Err(e) => {
                tracing::warn!("Failed to read session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.token = Some(token.to_string()))
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| entries.token = None)
    }

    fn last_board(&self) -> Option<String> {
        self.read().ok().and_then(|entries| entries.last_board)
    }

    fn save_last_board(&self, board_id: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.last_board = Some(board_id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    /// The stored token was rejected and has been evicted.
    SignInRequired,
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
    expired: Arc<AtomicBool>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: impl SessionStore + 'static) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store: Arc::new(store),
            expired: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemorySessionStore::new())
    }

    pub fn token(&self) -> Option<String> {
        self.store.load_token().filter(|t| !t.is_empty())
    }

    pub fn is_signed_in(&self) -> bool {
        self.token().is_some()
    }

    pub fn sign_in(&self, token: &str) -> Result<(), StoreError> {
        self.store.save_token(token)?;
        self.expired.store(false, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::SignedIn);
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), StoreError> {
        self.store.clear_token()
    }

    /// Evicts `rejected` after a 401. A token stored after the rejected
    /// request was sent is left alone. Only the first caller since the last
    /// sign-in emits `SignInRequired`; returns whether this call did.
    pub(crate) fn expire(&self, rejected: Option<&str>) -> bool {
        if self.token().as_deref() != rejected {
            tracing::debug!("Ignoring 401 for a token that has since been replaced");
            return false;
        }
        if self.expired.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.store.clear_token() {
            tracing::warn!("Failed to clear rejected token: {}", e);
        }
        tracing::info!("Session expired, sign-in required");
        let _ = self.events.send(SessionEvent::SignInRequired);
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn last_board(&self) -> Option<String> {
        self.store.last_board()
    }

    pub fn remember_board(&self, board_id: &str) -> Result<(), StoreError> {
        self.store.save_last_board(board_id)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signed_in", &self.is_signed_in())
            .field("expired", &self.expired.load(Ordering::SeqCst))
            .finish()
    }
}
