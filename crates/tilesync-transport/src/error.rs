use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Every variant is either *transient* (worth retrying against the same
/// endpoint) or *terminal* (the endpoint is abandoned). See
/// [`TransportError::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint could not be reached (refused, reset, DNS, TLS).
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The endpoint answered but refused the upgrade, or spoke a protocol
    /// we don't understand.
    #[error("handshake with {url} rejected: {reason}")]
    Handshake { url: String, reason: String },

    /// No handshake acknowledgment arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The transport was shut down locally.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` if retrying the same endpoint may succeed.
    ///
    /// Timeouts and socket-level failures are transient. A rejected
    /// handshake or a local shutdown is not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Handshake { .. } | Self::Shutdown)
    }
}
