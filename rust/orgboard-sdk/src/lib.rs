//! # orgboard-sdk
//!
//! Rust client SDK for the Orgboard backend: organizations, boards, tasks,
//! users, parties and chat.
//!
//! Two independent pieces make up the client:
//!
//! - **Lists** - a [`ListController`] owns the search, sort and paging state of
//!   one view and refetches through a [`CollectionSource`] whenever it changes.
//! - **Realtime** - a [`Channel`] keeps one STOMP-over-WebSocket connection
//!   alive, and a [`ChatSession`] layers room selection and messaging on top.
//!
//! ## Example
//!
//! ```rust,ignore
//! use orgboard_sdk::prelude::*;
//!
//! let config = ClientConfig::from_env();
//! let session = Session::new(FileSessionStore::open_default()?);
//! let api = ApiClient::new(&config, session.clone())?;
//!
//! let orgs = ListController::open(api.organizations(), QueryState::default()).await;
//! orgs.set_search("acme").await?;
//! println!("{} pages", orgs.snapshot().page_count());
//!
//! let channel = Channel::new(&config.ws_url, config.channel.clone(), session);
//! channel.connect();
//! channel.wait_connected(Duration::from_secs(5)).await?;
//!
//! let chat = ChatSession::new(api, channel);
//! chat.select_room(chat.rooms().await?.remove(0)).await?;
//! chat.send_message("hello")?;
//! ```

mod channel;
mod chat;
mod config;
mod controller;
mod error;
mod fetcher;
pub mod frame;
mod http;
pub mod prelude;
mod query;
mod resources;
mod session;
mod subscription;
mod validation;

pub use channel::{Channel, ChannelState, DisconnectReason, Realtime};
pub use chat::{
    room_topic, send_destination, ChatBackend, ChatMessage, ChatRoom, ChatSession,
    OutgoingMessage,
};
pub use config::{ChannelConfig, ClientConfig, DEFAULT_API_URL, DEFAULT_WS_URL};
pub use controller::{FetchOutcome, ListController, ListSnapshot};
pub use error::{ApiError, ChannelError, ChatError, StoreError, ValidationError};
pub use fetcher::{encode_component, search_query_string, CollectionSource, ParamStyle, SearchEndpoint};
pub use http::{ApiClient, SignInResponse, SignUpRequest};
pub use query::{QueryState, ResultPage, SearchBy, SortDirection, DEFAULT_PAGE_SIZE, DEFAULT_SORT_BY};
pub use resources::{Article, Organization, Party, Task, User};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionEvent, SessionStore};
pub use subscription::{InboundMessage, MessageReceiver, Subscription, SubscriptionRegistry};
pub use validation::{validate_password_pair, validate_phone, validate_required, MIN_PASSWORD_LEN};

pub use serde_json::Value;
