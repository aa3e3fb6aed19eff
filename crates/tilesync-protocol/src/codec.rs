//! Codec trait and the JSON implementation.
//!
//! The session layer doesn't care how events become text. It only needs
//! something that implements [`Codec`].

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to text frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes one text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`). This is what the game
/// server speaks.
///
/// ```rust
/// use tilesync_protocol::{ClientEvent, Codec, JsonCodec, Ping};
///
/// let frame = JsonCodec
///     .encode(&ClientEvent::Ping(Ping { client_time: 5000 }))
///     .unwrap();
/// assert_eq!(frame, r#"["ping",{"clientTime":5000}]"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Direction, EntityId, PlayerMoved, ServerEvent};

    #[test]
    fn test_decode_player_moved_frame() {
        let frame = r#"["playerMoved",{"playerId":"abc","x":12,"y":34.5,"direction":"left","isMoving":true}]"#;
        let event: ServerEvent = JsonCodec.decode(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::PlayerMoved(PlayerMoved {
                player_id: EntityId::from("abc"),
                x: 12.0,
                y: 34.5,
                direction: Direction::Left,
                is_moving: true,
                area: None,
                timestamp: None,
            })
        );
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<ServerEvent, _> = JsonCodec.decode("not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
