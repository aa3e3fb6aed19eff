//! Wire protocol for tilesync.
//!
//! This crate defines what the client and the game server say to each
//! other:
//!
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) and their payloads.
//!   Every frame is a two-element JSON array, `["eventName", {payload}]`,
//!   and payload field names match the server exactly (`isMoving`,
//!   `playerId`, `clientTime`, ...).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become text
//!   frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer doesn't know about connections or retries. It only
//! knows how to serialize and deserialize events.
//!
//! ```text
//! Transport (text frames) → Protocol (events) → Session (lifecycle)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, ConnectionError, GameStateSnapshot, JoinGame, Ping,
    PlayerAttack, PlayerAttacked, PlayerDisconnected, PlayerMoved, Pong,
    ServerEvent, UpdatePosition,
};
pub use types::{wall_clock_millis, AreaId, Direction, EntityId, PlayerState};
