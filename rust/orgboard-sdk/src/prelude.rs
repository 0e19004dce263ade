//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use orgboard_sdk::prelude::*;
//! ```

pub use crate::{
    ApiClient, ApiError, Channel, ChannelConfig, ChannelState, ChatError, ChatMessage, ChatRoom,
    ChatSession, ClientConfig, CollectionSource, FetchOutcome, FileSessionStore, ListController,
    ListSnapshot, QueryState, ResultPage, SearchBy, Session, SessionEvent, SortDirection,
};

pub use futures_util::StreamExt;
pub use std::time::Duration;
