//! Connection lifecycle for tilesync.
//!
//! A [`ConnectionSession`] owns the single logical link between this client
//! and a game server. It:
//!
//! - dials candidate endpoints in order with per-class retry and backoff
//!   ([`SessionConfig`], [`RetryPolicy`]),
//! - falls back to an in-process [`OfflineConnection`] when every endpoint
//!   fails, so gameplay code never sees a missing network,
//! - probes latency while linked,
//! - reports what the server says as typed [`SessionEvent`]s on a single
//!   subscriber channel.
//!
//! The session never mutates game state itself. Whoever drains the event
//! channel decides what to do with it.

mod config;
mod error;
mod event;
mod link;
mod offline;
mod session;
mod state;

pub use config::{Endpoint, EndpointClass, RetryPolicy, SessionConfig};
pub use error::SessionError;
pub use event::{Identity, LinkMode, SessionEvent, SessionHandle};
pub use offline::{OfflineConnection, PLAYER_COLORS};
pub use session::ConnectionSession;
pub use state::ConnectionState;
