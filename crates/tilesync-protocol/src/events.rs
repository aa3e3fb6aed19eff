//! Wire events.
//!
//! Every frame is a JSON array of exactly two elements: the event name and
//! its payload object.
//!
//! ```text
//! ["updatePosition",{"x":10,"y":20,"direction":"right","isMoving":true,"area":"down","timestamp":1700000000000}]
//! ```
//!
//! [`ClientEvent`] is what this client sends and [`ServerEvent`] is what it
//! receives. Both implement `Serialize` and `Deserialize`, so a test server
//! can decode what the client encodes and vice versa.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

use crate::{AreaId, Codec, Direction, EntityId, PlayerState, ProtocolError};

/// Declares an event enum whose variants each wrap one payload type, and
/// implements the `[name, payload]` array layout for it.
macro_rules! wire_events {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident($payload:ty) = $wire:literal,
            )*
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant($payload),
            )*
        }

        impl $name {
            /// Every event name this enum understands.
            pub const NAMES: &'static [&'static str] = &[$($wire),*];

            /// The wire name of this event.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $wire,)*
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                let mut seq = serializer.serialize_tuple(2)?;
                match self {
                    $(
                        Self::$variant(payload) => {
                            seq.serialize_element($wire)?;
                            seq.serialize_element(payload)?;
                        }
                    )*
                }
                seq.end()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                struct EventVisitor;

                impl<'de> Visitor<'de> for EventVisitor {
                    type Value = $name;

                    fn expecting(
                        &self,
                        f: &mut fmt::Formatter<'_>,
                    ) -> fmt::Result {
                        f.write_str("a [name, payload] event array")
                    }

                    fn visit_seq<A: SeqAccess<'de>>(
                        self,
                        mut seq: A,
                    ) -> Result<$name, A::Error> {
                        let name: String = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                        match name.as_str() {
                            $(
                                $wire => seq
                                    .next_element()?
                                    .map($name::$variant)
                                    .ok_or_else(|| {
                                        de::Error::invalid_length(1, &self)
                                    }),
                            )*
                            other => Err(de::Error::unknown_variant(
                                other,
                                $name::NAMES,
                            )),
                        }
                    }
                }

                deserializer.deserialize_seq(EventVisitor)
            }
        }
    };
}

// --- Client → server payloads ---

/// Announces the local player. Sent once right after connecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinGame {
    pub nickname: String,
}

/// The local player's position. Coordinates are rounded to integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePosition {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub is_moving: bool,
    pub area: AreaId,
    pub timestamp: u64,
}

/// The local player started an attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttack {
    pub direction: Direction,
    pub x: i32,
    pub y: i32,
    pub timestamp: u64,
}

/// Latency probe. The server echoes `client_time` back in a [`Pong`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    pub client_time: u64,
}

// --- Server → client payloads ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDisconnected {
    pub player_id: EntityId,
}

/// A remote player's new authoritative position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMoved {
    pub player_id: EntityId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub is_moving: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A remote player attacked. `x`/`y` is where the attack originated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAttacked {
    pub player_id: EntityId,
    #[serde(default)]
    pub direction: Direction,
    pub x: f64,
    pub y: f64,
}

/// The full list of players the server knows about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub players: Vec<PlayerState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub client_time: u64,
}

/// The server refused or failed something on this connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionError {
    #[serde(default)]
    pub message: String,
}

wire_events! {
    /// Events this client sends to the server.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ClientEvent {
        JoinGame(JoinGame) = "joinGame",
        UpdatePosition(UpdatePosition) = "updatePosition",
        PlayerAttack(PlayerAttack) = "playerAttack",
        Ping(Ping) = "ping",
    }
}

wire_events! {
    /// Events the server sends to this client.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ServerEvent {
        /// Confirms the local player's own join.
        PlayerJoined(PlayerState) = "playerJoined",
        /// Another player entered the game.
        PlayerConnected(PlayerState) = "playerConnected",
        PlayerDisconnected(PlayerDisconnected) = "playerDisconnected",
        PlayerMoved(PlayerMoved) = "playerMoved",
        PlayerAttacked(PlayerAttacked) = "playerAttacked",
        GameState(GameStateSnapshot) = "gameState",
        Pong(Pong) = "pong",
        ConnectionError(ConnectionError) = "connectionError",
    }
}

impl ServerEvent {
    /// Decodes and validates one inbound frame.
    ///
    /// A well-formed frame with a name outside [`ServerEvent::NAMES`] is
    /// reported as `UnknownEvent` rather than a decode failure, so callers
    /// can ignore events they don't handle without logging them as
    /// malformed.
    ///
    /// # Errors
    /// `UnknownEvent`, `Decode` or `InvalidMessage`.
    pub fn decode_frame<C: Codec>(
        codec: &C,
        frame: &str,
    ) -> Result<Self, ProtocolError> {
        match codec.decode::<ServerEvent>(frame) {
            Ok(event) => {
                event.validate()?;
                Ok(event)
            }
            Err(err) => match codec.decode::<(String, IgnoredAny)>(frame) {
                Ok((name, _)) if !Self::NAMES.contains(&name.as_str()) => {
                    Err(ProtocolError::UnknownEvent(name))
                }
                _ => Err(err),
            },
        }
    }

    /// Checks the content of a decoded event.
    ///
    /// Decoding only guarantees the shape. This rejects events that parse
    /// but can't be applied: empty ids and health above 100.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` describing the first problem.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ServerEvent::PlayerJoined(state)
            | ServerEvent::PlayerConnected(state) => validate_state(state),
            ServerEvent::GameState(snapshot) => {
                snapshot.players.iter().try_for_each(validate_state)
            }
            ServerEvent::PlayerDisconnected(PlayerDisconnected { player_id })
            | ServerEvent::PlayerMoved(PlayerMoved { player_id, .. })
            | ServerEvent::PlayerAttacked(PlayerAttacked { player_id, .. }) => {
                validate_id(player_id)
            }
            ServerEvent::Pong(_) | ServerEvent::ConnectionError(_) => Ok(()),
        }
    }
}

fn validate_id(id: &EntityId) -> Result<(), ProtocolError> {
    if id.as_str().is_empty() {
        return Err(ProtocolError::InvalidMessage("empty player id".into()));
    }
    Ok(())
}

fn validate_state(state: &PlayerState) -> Result<(), ProtocolError> {
    validate_id(&state.id)?;
    match state.health {
        Some(health) if health > 100 => Err(ProtocolError::InvalidMessage(
            format!("player {} has health {health}", state.id),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Outbound shape
    //
    // The server matches on exact field names, so these pin the JSON
    // byte-for-byte rather than round-tripping.
    // =========================================================================

    #[test]
    fn test_update_position_wire_shape() {
        let event = ClientEvent::UpdatePosition(UpdatePosition {
            x: 10,
            y: 20,
            direction: Direction::Right,
            is_moving: true,
            area: AreaId::default(),
            timestamp: 1234,
        });
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"["updatePosition",{"x":10,"y":20,"direction":"right","isMoving":true,"area":"down","timestamp":1234}]"#
        );
    }

    #[test]
    fn test_join_game_and_ping_wire_shape() {
        let join = ClientEvent::JoinGame(JoinGame {
            nickname: "Zelda".into(),
        });
        assert_eq!(
            serde_json::to_string(&join).unwrap(),
            r#"["joinGame",{"nickname":"Zelda"}]"#
        );

        let ping = ClientEvent::Ping(Ping { client_time: 99 });
        assert_eq!(
            serde_json::to_string(&ping).unwrap(),
            r#"["ping",{"clientTime":99}]"#
        );
    }

    #[test]
    fn test_player_attack_wire_shape() {
        let event = ClientEvent::PlayerAttack(PlayerAttack {
            direction: Direction::Up,
            x: 5,
            y: -3,
            timestamp: 7,
        });
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"["playerAttack",{"direction":"up","x":5,"y":-3,"timestamp":7}]"#
        );
    }

    // =========================================================================
    // Inbound decoding
    // =========================================================================

    #[test]
    fn test_decode_game_state_with_partial_players() {
        let frame = r#"["gameState",{"players":[
            {"id":"a","x":1,"y":2,"nickname":"Ann","health":80},
            {"id":"b","x":3,"y":4}
        ]}]"#;
        let event: ServerEvent = serde_json::from_str(frame).unwrap();
        let ServerEvent::GameState(snapshot) = event else {
            panic!("expected gameState, got {event:?}");
        };
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.players[0].nickname.as_deref(), Some("Ann"));
        assert_eq!(snapshot.players[0].health, Some(80));
        assert_eq!(snapshot.players[1].nickname, None);
    }

    #[test]
    fn test_decode_player_disconnected() {
        let event: ServerEvent =
            serde_json::from_str(r#"["playerDisconnected",{"playerId":"x"}]"#)
                .unwrap();
        assert_eq!(
            event,
            ServerEvent::PlayerDisconnected(PlayerDisconnected {
                player_id: EntityId::from("x"),
            })
        );
        assert_eq!(event.name(), "playerDisconnected");
    }

    #[test]
    fn test_decode_unknown_event_fails() {
        let result: Result<ServerEvent, _> =
            serde_json::from_str(r#"["chatMessage",{"text":"hi"}]"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("chatMessage"), "unexpected error: {err}");
    }

    #[test]
    fn test_decode_frame_classifies_unknown_event() {
        let result = ServerEvent::decode_frame(
            &crate::JsonCodec,
            r#"["chatMessage",{"text":"hi"}]"#,
        );
        assert!(
            matches!(result, Err(ProtocolError::UnknownEvent(ref name)) if name == "chatMessage")
        );
    }

    #[test]
    fn test_decode_frame_known_event_with_bad_payload_is_decode_error() {
        let result = ServerEvent::decode_frame(
            &crate::JsonCodec,
            r#"["playerMoved",{"playerId":"a"}]"#,
        );
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_frame_rejects_invalid_content() {
        let result = ServerEvent::decode_frame(
            &crate::JsonCodec,
            r#"["playerDisconnected",{"playerId":""}]"#,
        );
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_decode_missing_payload_fails() {
        let result: Result<ServerEvent, _> = serde_json::from_str(r#"["pong"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_missing_required_field_fails() {
        // playerMoved without coordinates can't be applied.
        let result: Result<ServerEvent, _> =
            serde_json::from_str(r#"["playerMoved",{"playerId":"a"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_object_instead_of_array_fails() {
        let result: Result<ServerEvent, _> =
            serde_json::from_str(r#"{"event":"pong","clientTime":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_event_decodes_for_test_servers() {
        let event: ClientEvent =
            serde_json::from_str(r#"["joinGame",{"nickname":"Bot"}]"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinGame(JoinGame {
                nickname: "Bot".into()
            })
        );
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_validate_rejects_empty_id() {
        let event = ServerEvent::PlayerDisconnected(PlayerDisconnected {
            player_id: EntityId::from(""),
        });
        assert!(matches!(
            event.validate(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_validate_rejects_health_above_hundred_in_snapshot() {
        let mut bad = PlayerState::new("b", 0.0, 0.0);
        bad.health = Some(101);
        let event = ServerEvent::GameState(GameStateSnapshot {
            players: vec![PlayerState::new("a", 0.0, 0.0), bad],
        });
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_decode_frame_connection_error() {
        let event = ServerEvent::decode_frame(
            &crate::JsonCodec,
            r#"["connectionError",{"message":"room full"}]"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::ConnectionError(ConnectionError {
                message: "room full".into()
            })
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_events() {
        let event = ServerEvent::Pong(Pong { client_time: 1 });
        assert!(event.validate().is_ok());
        let event = ServerEvent::PlayerConnected(PlayerState::new("a", 1.0, 1.0));
        assert!(event.validate().is_ok());
    }
}
