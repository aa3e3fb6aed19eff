//! The per-frame driver that ties session, throttle and roster together.
//!
//! A game owns one [`GameSessionController`] and calls
//! [`frame`](GameSessionController::frame) once per display refresh:
//!
//! ```text
//! session events ──→ roster (add / move / attack / remove / reconcile)
//! session state  ──→ play mode
//! local state    ──→ throttle ──→ send_position
//! now            ──→ roster.tick
//!                ──→ FrameView for the renderer
//! ```
//!
//! Network events only reach the roster here, inside `frame`. The session's
//! tasks never touch it.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tilesync_protocol::{EntityId, PlayerState};
use tilesync_roster::{DEFAULT_COLOR, MultiplayerRoster, RemoteEntity};
use tilesync_session::{
    ConnectionSession, ConnectionState, Identity, LinkMode, SessionError,
    SessionEvent, SessionHandle,
};
use tilesync_throttle::{LocalPlayerState, OutboundStateThrottle};
use tilesync_transport::Connector;
use tokio::sync::mpsc;

use crate::{InputSource, SyncConfig, TilesyncError};

/// Whether remote players are part of the game right now.
///
/// The local game is playable in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    Singleplayer,
    Multiplayer,
}

impl PlayMode {
    /// Multiplayer only while a real server link is up.
    pub fn for_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Self::Multiplayer,
            _ => Self::Singleplayer,
        }
    }
}

/// Something the UI should tell the player about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected,
    OfflineMode,
    Disconnected { reason: String },
    PeerJoined { nickname: String },
    PeerLeft { nickname: String },
    Error { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected to multiplayer server"),
            Self::OfflineMode => {
                write!(f, "Server unavailable, playing in offline mode")
            }
            Self::Disconnected { reason } => {
                write!(f, "Disconnected ({reason}), playing singleplayer")
            }
            Self::PeerJoined { nickname } => {
                write!(f, "{nickname} joined the game")
            }
            Self::PeerLeft { nickname } => write!(f, "{nickname} left the game"),
            Self::Error { reason } => write!(f, "Connection error: {reason}"),
        }
    }
}

/// The local player as the server registered it.
///
/// The server picks the color. Position stays with the local simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProfile {
    pub id: EntityId,
    pub nickname: String,
    pub color: String,
}

impl LocalProfile {
    fn from_joined(state: PlayerState, identity: &Identity) -> Self {
        Self {
            id: state.id,
            nickname: state
                .nickname
                .unwrap_or_else(|| identity.nickname.clone()),
            color: state.color.unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    pub play_mode: PlayMode,
    pub connection: ConnectionState,
    pub latency: Option<Duration>,
    pub local_id: Option<&'a EntityId>,
    /// Name and color to draw the local player with, once joined.
    pub local: Option<&'a LocalProfile>,
    /// Remote entities in every area.
    pub remote_count: usize,
    /// Remote entities in the local player's area, back to front.
    pub visible: Vec<&'a RemoteEntity>,
}

/// Builder for a [`GameSessionController`].
///
/// # Example
///
/// ```rust,no_run
/// use tilesync::prelude::*;
///
/// # fn demo() -> Result<(), TilesyncError> {
/// let controller = GameSessionController::builder(WebSocketConnector)
///     .config(SyncConfig::from_json_str(
///         r#"{"session":{"endpoints":[{"url":"ws://localhost:3001"}]}}"#,
///     )?)
///     .nickname("Hero")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct GameSessionControllerBuilder<C: Connector> {
    connector: C,
    config: SyncConfig,
    identity: Identity,
}

impl<C: Connector> GameSessionControllerBuilder<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: SyncConfig::default(),
            identity: Identity::default(),
        }
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the nickname sent when joining.
    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.identity = Identity::new(nickname);
        self
    }

    /// Checks the config and builds an idle controller.
    ///
    /// # Errors
    /// `TilesyncError::Config` if an endpoint URL is unusable.
    pub fn build(self) -> Result<GameSessionController<C>, TilesyncError> {
        self.config.check()?;
        Ok(GameSessionController::new(
            self.connector,
            self.config,
            self.identity,
        ))
    }
}

/// Drives one player's multiplayer session, frame by frame.
pub struct GameSessionController<C: Connector> {
    session: ConnectionSession<C>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    throttle: OutboundStateThrottle,
    roster: MultiplayerRoster,
    identity: Identity,
    local: Option<LocalProfile>,
    play_mode: PlayMode,
    notices: Vec<Notice>,
}

impl<C: Connector> GameSessionController<C> {
    pub fn builder(connector: C) -> GameSessionControllerBuilder<C> {
        GameSessionControllerBuilder::new(connector)
    }

    /// Creates an idle controller. Out-of-range config values are clamped.
    pub fn new(connector: C, config: SyncConfig, identity: Identity) -> Self {
        let config = config.validated();
        let session = ConnectionSession::new(connector, config.session);
        let events = session.subscribe();
        Self {
            session,
            events,
            throttle: OutboundStateThrottle::new(config.throttle),
            roster: MultiplayerRoster::new(config.interpolation),
            identity,
            local: None,
            play_mode: PlayMode::Singleplayer,
            notices: Vec::new(),
        }
    }

    /// Starts connecting. The returned future owns what it needs, so it
    /// can be spawned while frames keep running.
    ///
    /// Results show up in later frames as the session reports them.
    ///
    /// # Errors
    /// Whatever [`ConnectionSession::connect`] returns.
    pub fn connect(
        &self,
    ) -> impl Future<Output = Result<SessionHandle, SessionError>> + Send + 'static
    {
        let session = self.session.clone();
        let identity = self.identity.clone();
        async move { session.connect(identity).await }
    }

    /// Drops the link and every remote entity. The local game carries on
    /// in singleplayer.
    pub fn disconnect(&mut self) {
        let was_active = self.session.state().is_active();
        self.session.disconnect();
        while self.events.try_recv().is_ok() {}

        self.roster.clear();
        self.throttle.reset();
        self.local = None;
        self.play_mode = PlayMode::Singleplayer;
        if was_active {
            self.notices.push(Notice::Disconnected {
                reason: "client disconnect".into(),
            });
        }
    }

    /// Runs one frame.
    ///
    /// `local` is the local player after this frame's simulation step.
    /// The local player is never moved by anything the server says.
    pub fn frame(
        &mut self,
        local: &LocalPlayerState,
        input: &impl InputSource,
        now: Instant,
    ) -> FrameView<'_> {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event, now);
        }

        let connection = self.session.state();
        let mode = PlayMode::for_state(connection);
        if mode != self.play_mode {
            tracing::info!(?mode, %connection, "play mode changed");
            self.play_mode = mode;
        }

        if connection.accepts_sends() {
            let engaged = input.is_analog_engaged();
            if let Some(snapshot) = self.throttle.poll(local, engaged, now) {
                self.session.send_position(
                    snapshot.x,
                    snapshot.y,
                    snapshot.facing,
                    snapshot.moving,
                    snapshot.area,
                );
            }
        }

        self.roster.tick(now, &local.area);

        let mut visible: Vec<&RemoteEntity> =
            self.roster.in_area(&local.area).collect();
        visible.sort_by(|a, b| {
            a.current
                .y
                .total_cmp(&b.current.y)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });

        FrameView {
            play_mode: self.play_mode,
            connection,
            latency: self.session.current_latency(),
            local_id: self.local_id(),
            local: self.local.as_ref(),
            remote_count: self.roster.len(),
            visible,
        }
    }

    /// Tells the server the local player attacked.
    pub fn attack(&self, local: &LocalPlayerState) {
        self.session.send_attack(
            local.facing,
            local.x.round() as i32,
            local.y.round() as i32,
        );
    }

    /// Notices gathered since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn roster(&self) -> &MultiplayerRoster {
        &self.roster
    }

    pub fn session(&self) -> &ConnectionSession<C> {
        &self.session
    }

    /// The server-assigned id of the local player, once it joined.
    pub fn local_id(&self) -> Option<&EntityId> {
        self.local.as_ref().map(|profile| &profile.id)
    }

    /// Name and server-assigned color of the local player, once joined.
    pub fn local_profile(&self) -> Option<&LocalProfile> {
        self.local.as_ref()
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    fn is_local(&self, id: &EntityId) -> bool {
        self.local_id() == Some(id)
    }

    fn apply(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::Connected { mode, .. } => {
                self.throttle.reset();
                self.notices.push(match mode {
                    LinkMode::Remote => Notice::Connected,
                    LinkMode::Offline => Notice::OfflineMode,
                });
            }
            SessionEvent::Disconnected { reason } => {
                tracing::info!(%reason, "link lost, continuing singleplayer");
                self.roster.clear();
                self.local = None;
                self.play_mode = PlayMode::Singleplayer;
                self.notices.push(Notice::Disconnected { reason });
            }
            SessionEvent::SelfJoined(state) => {
                tracing::info!(entity_id = %state.id, "local player joined");
                // A snapshot may have listed us before the join arrived.
                self.roster.remove(&state.id);
                self.local =
                    Some(LocalProfile::from_joined(state, &self.identity));
            }
            SessionEvent::PeerJoined(state) => {
                if self.is_local(&state.id) {
                    return;
                }
                if let Ok(entity) = self.roster.add(&state, now) {
                    self.notices.push(Notice::PeerJoined {
                        nickname: entity.display_name.clone(),
                    });
                }
            }
            SessionEvent::PeerLeft { id, reason } => {
                if let Some(entity) = self.roster.remove(&id) {
                    tracing::debug!(entity_id = %id, %reason, "peer left");
                    self.notices.push(Notice::PeerLeft {
                        nickname: entity.display_name,
                    });
                }
            }
            SessionEvent::PeerMoved(moved) => {
                if !self.is_local(&moved.player_id) {
                    let _ = self.roster.update_position(&moved, now);
                }
            }
            SessionEvent::PeerAttacked(attack) => {
                if !self.is_local(&attack.player_id) {
                    let _ = self.roster.apply_attack(&attack, now);
                }
            }
            SessionEvent::FullSync(snapshot) => {
                let local_id = self.local.as_ref().map(|profile| &profile.id);
                self.roster.reconcile(&snapshot, local_id, now);
            }
            SessionEvent::Error { reason } => {
                tracing::warn!(%reason, "session error");
                self.notices.push(Notice::Error { reason });
            }
        }
    }
}

impl<C: Connector> Drop for GameSessionController<C> {
    fn drop(&mut self) {
        self.session.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_mode_multiplayer_only_when_connected() {
        assert_eq!(
            PlayMode::for_state(ConnectionState::Connected),
            PlayMode::Multiplayer
        );
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::OfflineFallback,
        ] {
            assert_eq!(PlayMode::for_state(state), PlayMode::Singleplayer);
        }
    }

    #[test]
    fn test_notice_display_texts() {
        assert_eq!(
            Notice::PeerJoined {
                nickname: "Zelda".into()
            }
            .to_string(),
            "Zelda joined the game"
        );
        assert_eq!(
            Notice::Disconnected {
                reason: "transport close".into()
            }
            .to_string(),
            "Disconnected (transport close), playing singleplayer"
        );
    }
}
