//! Error type for the realtime client.

use teachlab_api::ApiError;

/// Errors surfaced by the session facade and connection manager.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Attempted to send while the transport is closed.
    #[error("not connected to the session server")]
    NotConnected,

    /// No active session to operate on.
    #[error("no active session")]
    NoSession,

    /// WebSocket transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// REST call failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The connection task is gone and cannot accept outbound frames.
    #[error("connection task stopped")]
    ChannelClosed,
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ClientError>;
