//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name,
    /// missing required fields, or wrong data types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is a well-formed event array, but its name isn't one this
    /// client handles.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The event parsed but its content is out of range, e.g. an empty
    /// entity id or a health value above 100.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
