//! In-process stand-in for the game server.
//!
//! When no endpoint answers, the session links to an [`OfflineConnection`]
//! instead. It speaks the same text-frame protocol as a real server, so
//! nothing above the transport can tell the difference:
//!
//! - `joinGame` is answered with a `playerJoined` for a generated player.
//! - `ping` is answered with a `pong` after a simulated 10-60 ms delay.
//! - Everything else is accepted and discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use tilesync_protocol::{
    ClientEvent, Codec, Direction, JsonCodec, PlayerState, Pong, ServerEvent,
    wall_clock_millis,
};
use tilesync_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::{Mutex, Notify, mpsc};

/// Colors the server hands out to players.
pub const PLAYER_COLORS: [&str; 12] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD",
    "#FFB347", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9", "#F8C471",
];

const DEFAULT_NICKNAME: &str = "MockPlayer";
const SPAWN: (f64, f64) = (400.0, 300.0);
const LATENCY_MS: std::ops::RangeInclusive<u64> = 10..=60;

/// A [`Connection`] whose far end is simulated in-process.
pub struct OfflineConnection {
    id: ConnectionId,
    codec: JsonCodec,
    outbox: mpsc::UnboundedSender<String>,
    inbox: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl OfflineConnection {
    pub fn new() -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        Self {
            id: ConnectionId::next(),
            codec: JsonCodec,
            outbox,
            inbox: Mutex::new(inbox),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    fn reply(&self, event: &ServerEvent) -> Result<(), TransportError> {
        let frame = self.codec.encode(event).map_err(|e| {
            TransportError::SendFailed(std::io::Error::other(e))
        })?;
        self.outbox
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed("offline peer".into()))
    }

    fn announce(&self, nickname: &str) -> Result<(), TransportError> {
        let mut rng = rand::rng();
        let now = wall_clock_millis();

        let mut player = PlayerState::new(
            format!("mock-player-{now}"),
            SPAWN.0,
            SPAWN.1,
        );
        player.nickname = Some(if nickname.is_empty() {
            DEFAULT_NICKNAME.to_owned()
        } else {
            nickname.to_owned()
        });
        player.direction = Some(Direction::Down);
        player.color = PLAYER_COLORS.choose(&mut rng).map(|c| (*c).to_owned());
        player.timestamp = Some(now);

        tracing::info!(
            id = %player.id,
            nickname = player.nickname.as_deref().unwrap_or(DEFAULT_NICKNAME),
            "offline peer announcing local player"
        );
        self.reply(&ServerEvent::PlayerJoined(player))
    }

    fn echo_later(&self, client_time: u64) {
        let latency =
            Duration::from_millis(rand::rng().random_range(LATENCY_MS));
        let outbox = self.outbox.clone();
        let pong = ServerEvent::Pong(Pong { client_time });
        let Ok(frame) = self.codec.encode(&pong) else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = outbox.send(frame);
        });
    }
}

impl Default for OfflineConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for OfflineConnection {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        match self.codec.decode::<ClientEvent>(frame) {
            Ok(ClientEvent::JoinGame(join)) => self.announce(&join.nickname),
            Ok(ClientEvent::Ping(ping)) => {
                self.echo_later(ping.client_time);
                Ok(())
            }
            Ok(event) => {
                tracing::trace!(event = event.name(), "offline peer discarding");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "offline peer ignoring bad frame");
                Ok(())
            }
        }
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            frame = inbox.recv() => Ok(frame),
            () = self.close_signal.notified() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        self.close_signal.notify_one();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
