//! # Tilesync
//!
//! Multiplayer state synchronization for browser-style 2D action games.
//!
//! The local player is simulated locally and never corrected by the
//! server. Remote players are server-authoritative: their reported
//! positions are eased into view, and full snapshots reconcile the roster.
//! When no server answers, an in-process offline peer takes over so the
//! game stays playable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use tilesync::prelude::*;
//!
//! struct NoInput;
//!
//! impl InputSource for NoInput {
//!     fn is_pressed(&self, _action: Action) -> bool {
//!         false
//!     }
//! }
//!
//! # async fn demo() -> Result<(), TilesyncError> {
//! let mut controller = GameSessionController::builder(WebSocketConnector)
//!     .config(SyncConfig::from_json_str(
//!         r#"{"session":{"endpoints":[{"url":"ws://localhost:3001"}]}}"#,
//!     )?)
//!     .nickname("Hero")
//!     .build()?;
//! controller.connect().await?;
//!
//! let local = LocalPlayerState::default();
//! let view = controller.frame(&local, &NoInput, Instant::now());
//! println!("{} remote players", view.remote_count);
//! # Ok(())
//! # }
//! ```

mod collab;
mod config;
mod controller;
mod error;

pub use collab::{
    Action, InputSource, JoystickState, Renderer, SpriteInfo, SpriteProvider,
    is_mirrored, sprite_for, sprite_name,
};
pub use config::SyncConfig;
pub use controller::{
    FrameView, GameSessionController, GameSessionControllerBuilder,
    LocalProfile, Notice, PlayMode,
};
pub use error::{ConfigError, TilesyncError};

pub use tilesync_protocol as protocol;
pub use tilesync_roster as roster;
pub use tilesync_session as session;
pub use tilesync_throttle as throttle;
pub use tilesync_transport as transport;

pub mod prelude {
    pub use crate::{
        Action, FrameView, GameSessionController, InputSource, JoystickState,
        LocalProfile, Notice, PlayMode, Renderer, SpriteProvider, SyncConfig,
        TilesyncError,
    };
    pub use tilesync_protocol::{AreaId, Direction, EntityId};
    pub use tilesync_roster::{AnimationKind, RemoteEntity};
    pub use tilesync_session::{ConnectionState, Identity, SessionEvent};
    pub use tilesync_throttle::LocalPlayerState;
    #[cfg(feature = "websocket")]
    pub use tilesync_transport::WebSocketConnector;
}
