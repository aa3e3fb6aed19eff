//! What the session reports to its subscriber.

use tilesync_protocol::{
    EntityId, GameStateSnapshot, PlayerAttacked, PlayerMoved, PlayerState,
};

/// Who the local player claims to be when joining.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub nickname: String,
}

impl Identity {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
        }
    }
}

/// Whether a link goes to a real server or to the in-process stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Remote,
    Offline,
}

/// The outcome of a successful [`connect`](crate::ConnectionSession::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// URL of the endpoint that answered. `None` in offline mode.
    pub endpoint: Option<String>,
    pub mode: LinkMode,
    /// Dial attempts made across all endpoints, including the winning one.
    pub attempts: u32,
}

/// One session notification, in the order the link delivered it.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A link is up. Also sent after a successful reconnect and when the
    /// offline peer takes over.
    Connected {
        endpoint: Option<String>,
        mode: LinkMode,
    },
    /// The link went away, by request or otherwise.
    Disconnected { reason: String },
    /// The server confirmed the local player's join.
    SelfJoined(PlayerState),
    PeerJoined(PlayerState),
    PeerLeft { id: EntityId, reason: String },
    PeerMoved(PlayerMoved),
    PeerAttacked(PlayerAttacked),
    /// Full roster broadcast.
    FullSync(GameStateSnapshot),
    /// A link-level failure worth showing to the player.
    Error { reason: String },
}
