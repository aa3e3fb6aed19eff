//! Unified error type for tilesync.

use tilesync_protocol::ProtocolError;
use tilesync_roster::RosterError;
use tilesync_session::SessionError;
use tilesync_transport::TransportError;

/// Problems loading a [`SyncConfig`](crate::SyncConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The JSON didn't parse.
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The config parsed but can't be used as is.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tilesync` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate.
#[derive(Debug, thiserror::Error)]
pub enum TilesyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
