//! Remote entities for tilesync.
//!
//! - [`RemoteEntity`]: one remote player, with a drawn position that lags
//!   the server-reported one.
//! - [`RemoteEntityInterpolator`]: eases drawn positions towards reported
//!   ones and runs animation frames.
//! - [`MultiplayerRoster`]: owns every remote entity, applies incremental
//!   events and full snapshots, and ends attack pulses on time.
//!
//! Nothing here reads a clock. Every operation takes `now`, which keeps the
//! whole crate deterministic under test.

mod entity;
mod error;
mod interpolation;
mod roster;

pub use entity::{
    AnimationKind, AnimationState, DEFAULT_COLOR, DEFAULT_HEALTH,
    DEFAULT_NICKNAME, InterpolationAnchor, Position, RemoteEntity,
};
pub use error::RosterError;
pub use interpolation::{InterpolationConfig, RemoteEntityInterpolator};
pub use roster::{MultiplayerRoster, ReconcileSummary};
