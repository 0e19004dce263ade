use thiserror::Error;

use crate::frame::FrameError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Not authorized, sign in again")]
    Unauthorized,

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Http(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write session file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse session file: {0}")]
    Deserialize(#[from] toml::de::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters long")]
    PasswordTooShort(usize),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Channel is not connected")]
    NotConnected,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Timed out waiting for the channel to connect")]
    Timeout,

    #[error("Channel closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message is blank")]
    BlankMessage,

    #[error("No chat room selected")]
    NoRoomSelected,

    #[error("Chat channel is not connected")]
    NotConnected,

    #[error("Failed to load history for room {room_id}: {source}")]
    History { room_id: i64, source: ApiError },

    #[error("Failed to subscribe to room {room_id}: {source}")]
    Subscribe { room_id: i64, source: ChannelError },

    #[error("Failed to mark room {room_id} as read: {source}")]
    MarkRead { room_id: i64, source: ApiError },

    #[error("Failed to publish to room {room_id}: {source}")]
    Publish { room_id: i64, source: ChannelError },

    #[error(transparent)]
    Api(#[from] ApiError),
}
