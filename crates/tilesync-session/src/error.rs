//! Error types for the session layer.

use crate::ConnectionState;

/// Errors returned by [`ConnectionSession::connect`](crate::ConnectionSession::connect).
///
/// Network failures are not errors at this level: exhausting every
/// endpoint resolves into offline fallback instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The config lists no endpoints to try.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// `disconnect()` was called while the attempt was in flight.
    #[error("connect cancelled by disconnect")]
    Cancelled,

    /// `connect()` was called while a link or attempt already exists.
    #[error("session already active ({0})")]
    AlreadyActive(ConnectionState),
}
