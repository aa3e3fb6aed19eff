//! The connection session: dialing, supervision and teardown.
//!
//! A [`ConnectionSession`] is a cheap handle over shared state. `connect`
//! walks the endpoint list, and on success spawns one supervisor task that
//! owns the link for its whole life:
//!
//! ```text
//!              ┌──────────── supervisor task ─────────────┐
//! send_* ──→ outbound queue ──→ link.send                 │
//!              │  link.recv ──→ decode ──→ event sink ──→ │──→ subscriber
//!              │  probe interval ──→ ping                 │
//!              │  cancel epoch ──→ close, exit            │
//!              └──────────────────────────────────────────┘
//! ```
//!
//! `disconnect` bumps the cancel epoch. Every wait in `connect` and in the
//! supervisor races against that epoch, so in-flight retry sleeps, dials
//! and probes stop promptly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tilesync_protocol::{
    AreaId, ClientEvent, Codec, ConnectionError, Direction, JoinGame,
    JsonCodec, Ping, PlayerAttack, PlayerDisconnected, ProtocolError,
    ServerEvent, UpdatePosition, wall_clock_millis,
};
use tilesync_transport::{Connection, Connector, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::link::Link;
use crate::{
    ConnectionState, Identity, LinkMode, OfflineConnection, SessionConfig,
    SessionError, SessionEvent, SessionHandle,
};

const NO_LATENCY: u64 = u64::MAX;
/// Unanswered pings kept for matching pongs.
const MAX_PENDING_PINGS: usize = 8;

/// Pings in flight on one link, keyed by the `clientTime` they carried.
type PendingPings = BTreeMap<u64, Instant>;

/// Supervises one logical connection to the game server.
///
/// Cloning is cheap: clones share the same connection.
pub struct ConnectionSession<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for ConnectionSession<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<C: Connector> {
    connector: C,
    config: SessionConfig,
    codec: JsonCodec,
    state: watch::Sender<ConnectionState>,
    latency_ms: AtomicU64,
    /// Bumped by `disconnect`. Work started under an older epoch stops.
    cancel: watch::Sender<u64>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientEvent>>>,
    sink: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

/// Result of walking the endpoint list once.
enum Dialed<T> {
    Established {
        conn: T,
        endpoint: String,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
    },
}

/// Why a supervisor stopped driving a link.
enum LinkEnd {
    Cancelled,
    Dropped(String),
}

impl<C: Connector> ConnectionSession<C> {
    /// Creates an idle session. Nothing is dialed until [`connect`].
    ///
    /// [`connect`]: ConnectionSession::connect
    pub fn new(connector: C, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (cancel, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                connector,
                config: config.validated(),
                codec: JsonCodec,
                state,
                latency_ms: AtomicU64::new(NO_LATENCY),
                cancel,
                outbound: Mutex::new(None),
                sink: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Installs a new event sink and returns its receiving end.
    ///
    /// There is one subscriber at a time: a previous receiver stops getting
    /// events once this is called.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.sink) = Some(tx);
        rx
    }

    /// Last measured round-trip time, if a probe has been answered.
    pub fn current_latency(&self) -> Option<Duration> {
        match self.shared.latency_ms.load(Ordering::Relaxed) {
            NO_LATENCY => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Dials the configured endpoints in order and links to the first one
    /// that completes a handshake.
    ///
    /// Transient failures are retried per the endpoint's [`RetryPolicy`];
    /// terminal ones skip to the next endpoint. If every endpoint fails the
    /// session links to an [`OfflineConnection`] and still returns `Ok`.
    ///
    /// # Errors
    /// - `NoEndpoints` if the config lists none.
    /// - `AlreadyActive` if the session isn't `Disconnected`.
    /// - `Cancelled` if [`disconnect`] ran while dialing.
    ///
    /// [`RetryPolicy`]: crate::RetryPolicy
    /// [`disconnect`]: ConnectionSession::disconnect
    pub async fn connect(
        &self,
        identity: Identity,
    ) -> Result<SessionHandle, SessionError> {
        let shared = &self.shared;
        if shared.config.endpoints.is_empty() {
            return Err(SessionError::NoEndpoints);
        }
        if !shared.transition(ConnectionState::Connecting) {
            return Err(SessionError::AlreadyActive(self.state()));
        }
        let epoch = *shared.cancel.borrow();

        let handle = match shared.dial(epoch).await? {
            Dialed::Established {
                conn,
                endpoint,
                attempts,
            } => {
                if !shared.transition_in(epoch, ConnectionState::Connected) {
                    let _ = conn.close().await;
                    return Err(SessionError::Cancelled);
                }
                tracing::info!(%endpoint, attempts, "connected to game server");
                self.start_link(
                    Link::Remote(conn),
                    Some(endpoint.clone()),
                    identity,
                    epoch,
                );
                SessionHandle {
                    endpoint: Some(endpoint),
                    mode: LinkMode::Remote,
                    attempts,
                }
            }
            Dialed::Exhausted { attempts } => {
                if !shared.transition_in(epoch, ConnectionState::OfflineFallback)
                {
                    return Err(SessionError::Cancelled);
                }
                tracing::info!(
                    attempts,
                    "all endpoints unavailable, switching to offline mode"
                );
                self.start_link(
                    Link::Offline(OfflineConnection::new()),
                    None,
                    identity,
                    epoch,
                );
                SessionHandle {
                    endpoint: None,
                    mode: LinkMode::Offline,
                    attempts,
                }
            }
        };

        Ok(handle)
    }

    /// Tears the link down and returns to `Disconnected`.
    ///
    /// Cancels in-flight dialing, backoff sleeps and liveness probes. Safe
    /// to call in any state, any number of times.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        shared.cancel.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        let epoch = *shared.cancel.borrow();
        *lock(&shared.outbound) = None;

        let was_active = self.state().is_active();
        shared.transition(ConnectionState::Disconnected);
        shared.latency_ms.store(NO_LATENCY, Ordering::Relaxed);

        if was_active {
            tracing::info!("disconnected by client");
            shared.emit(
                epoch,
                SessionEvent::Disconnected {
                    reason: "client disconnect".into(),
                },
            );
        }
    }

    /// Queues the local player's position. Dropped silently unless a link
    /// is up.
    pub fn send_position(
        &self,
        x: i32,
        y: i32,
        facing: Direction,
        moving: bool,
        area: AreaId,
    ) {
        self.shared.enqueue(ClientEvent::UpdatePosition(UpdatePosition {
            x,
            y,
            direction: facing,
            is_moving: moving,
            area,
            timestamp: wall_clock_millis(),
        }));
    }

    /// Queues an attack. Dropped silently unless a link is up.
    pub fn send_attack(&self, facing: Direction, x: i32, y: i32) {
        self.shared.enqueue(ClientEvent::PlayerAttack(PlayerAttack {
            direction: facing,
            x,
            y,
            timestamp: wall_clock_millis(),
        }));
    }

    fn start_link(
        &self,
        link: Link<C::Connection>,
        endpoint: Option<String>,
        identity: Identity,
        epoch: u64,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.shared.outbound) = Some(tx);

        // Runs until the link drops for good or the epoch moves on.
        tokio::spawn(supervise(
            Arc::clone(&self.shared),
            link,
            endpoint,
            rx,
            identity,
            epoch,
        ));
    }
}

impl<C: Connector> Shared<C> {
    fn is_current(&self, epoch: u64) -> bool {
        *self.cancel.borrow() == epoch
    }

    /// Applies a guarded state transition. Returns `false` if the move
    /// isn't allowed from the current state.
    fn transition(&self, target: ConnectionState) -> bool {
        self.apply_transition(target, None)
    }

    /// Like [`transition`](Self::transition), but refuses once `epoch` has
    /// been superseded. Work from a cancelled attempt can't move the state
    /// of the attempt that replaced it.
    fn transition_in(&self, epoch: u64, target: ConnectionState) -> bool {
        self.apply_transition(target, Some(epoch))
    }

    fn apply_transition(
        &self,
        target: ConnectionState,
        epoch: Option<u64>,
    ) -> bool {
        let mut from = target;
        let changed = self.state.send_if_modified(|state| {
            from = *state;
            let current = epoch.is_none_or(|epoch| self.is_current(epoch));
            if current && *state != target && state.can_transition_to(target)
            {
                *state = target;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(%from, to = %target, "connection state changed");
        } else if from != target {
            tracing::debug!(%from, to = %target, "ignoring invalid transition");
        }
        changed
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Forwards an event to the subscriber, unless `epoch` is stale.
    fn emit(&self, epoch: u64, event: SessionEvent) {
        let mut sink = lock(&self.sink);
        if !self.is_current(epoch) {
            tracing::trace!(?event, "dropping event from a cancelled link");
            return;
        }
        if let Some(tx) = sink.as_ref() {
            if tx.send(event).is_err() {
                *sink = None;
            }
        }
    }

    fn enqueue(&self, event: ClientEvent) {
        if !self.current().accepts_sends() {
            tracing::trace!(event = event.name(), "not linked, dropping");
            return;
        }
        if let Some(tx) = lock(&self.outbound).as_ref() {
            let _ = tx.send(event);
        }
    }

    async fn cancelled(&self, epoch: u64) {
        let mut rx = self.cancel.subscribe();
        // The sender lives as long as `self`, so this only ends on a bump.
        let _ = rx.wait_for(|current| *current != epoch).await;
    }

    /// Walks every endpoint once, applying its retry policy.
    async fn dial(
        &self,
        epoch: u64,
    ) -> Result<Dialed<C::Connection>, SessionError> {
        let mut attempts = 0;

        for endpoint in &self.config.endpoints {
            let url = endpoint.url.as_str();
            let class = endpoint.class();
            let policy = self.config.policy_for(class);

            for attempt in 0..policy.max_attempts {
                let delay = policy.delay_before(attempt);
                if !delay.is_zero() {
                    tracing::debug!(
                        url,
                        attempt,
                        ?delay,
                        "backing off before retry"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.cancelled(epoch) => {
                            return Err(SessionError::Cancelled);
                        }
                    }
                }

                attempts += 1;
                let result = tokio::select! {
                    result = tokio::time::timeout(
                        policy.handshake_timeout,
                        self.connector.connect(url),
                    ) => result.unwrap_or(Err(TransportError::Timeout(
                        policy.handshake_timeout,
                    ))),
                    () = self.cancelled(epoch) => {
                        return Err(SessionError::Cancelled);
                    }
                };

                match result {
                    Ok(conn) => {
                        return Ok(Dialed::Established {
                            conn,
                            endpoint: url.to_owned(),
                            attempts,
                        });
                    }
                    Err(e) if e.is_transient() => {
                        tracing::debug!(
                            url,
                            attempt = attempt + 1,
                            max_attempts = policy.max_attempts,
                            error = %e,
                            "connect attempt failed"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            url,
                            error = %e,
                            "endpoint rejected handshake, skipping"
                        );
                        break;
                    }
                }
            }

            tracing::info!(
                url,
                ?class,
                "endpoint unavailable, trying next candidate"
            );
        }

        Ok(Dialed::Exhausted { attempts })
    }

    /// Matches a pong to its ping. Older unanswered pings are dropped.
    fn record_pong(&self, client_time: u64, pings: &mut PendingPings) {
        let Some(sent) = pings.remove(&client_time) else {
            tracing::debug!(client_time, "pong for unknown ping");
            return;
        };
        *pings = pings.split_off(&client_time);

        let rtt = u64::try_from(sent.elapsed().as_millis())
            .unwrap_or(NO_LATENCY - 1);
        self.latency_ms.store(rtt, Ordering::Relaxed);
        tracing::trace!(rtt_ms = rtt, "latency sample");
    }

    /// Turns one inbound frame into at most one session event.
    fn dispatch(&self, frame: &str, epoch: u64, pings: &mut PendingPings) {
        let event = match ServerEvent::decode_frame(&self.codec, frame) {
            Ok(event) => event,
            Err(ProtocolError::UnknownEvent(name)) => {
                tracing::debug!(event = %name, "ignoring unhandled event");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed frame");
                return;
            }
        };

        let event = match event {
            ServerEvent::Pong(pong) => {
                self.record_pong(pong.client_time, pings);
                return;
            }
            ServerEvent::PlayerJoined(player) => {
                SessionEvent::SelfJoined(player)
            }
            ServerEvent::PlayerConnected(player) => {
                SessionEvent::PeerJoined(player)
            }
            ServerEvent::PlayerDisconnected(PlayerDisconnected {
                player_id,
            }) => SessionEvent::PeerLeft {
                id: player_id,
                reason: "disconnected".into(),
            },
            ServerEvent::PlayerMoved(moved) => SessionEvent::PeerMoved(moved),
            ServerEvent::PlayerAttacked(attack) => {
                SessionEvent::PeerAttacked(attack)
            }
            ServerEvent::GameState(snapshot) => SessionEvent::FullSync(snapshot),
            ServerEvent::ConnectionError(ConnectionError { message }) => {
                tracing::warn!(%message, "server reported a connection error");
                SessionEvent::Error { reason: message }
            }
        };
        self.emit(epoch, event);
    }

    async fn send_event<T: Connection>(
        &self,
        link: &T,
        event: &ClientEvent,
    ) -> Result<(), TransportError> {
        let frame = match self.codec.encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(
                    event = event.name(),
                    error = %e,
                    "failed to encode event"
                );
                return Ok(());
            }
        };
        link.send(&frame).await
    }

    /// Pumps one link until it drops or the session is cancelled.
    async fn drive<T: Connection>(
        &self,
        link: &T,
        outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
        epoch: u64,
    ) -> LinkEnd {
        let mut probe = tokio::time::interval(self.config.probe_interval);
        probe.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );
        let mut pings = PendingPings::new();

        loop {
            tokio::select! {
                () = self.cancelled(epoch) => return LinkEnd::Cancelled,

                frame = link.recv() => match frame {
                    Ok(Some(frame)) => {
                        self.dispatch(&frame, epoch, &mut pings);
                    }
                    Ok(None) => return LinkEnd::Dropped("transport close".into()),
                    Err(e) => {
                        let reason = e.to_string();
                        self.emit(epoch, SessionEvent::Error {
                            reason: reason.clone(),
                        });
                        return LinkEnd::Dropped(reason);
                    }
                },

                Some(event) = outbound.recv() => {
                    if let Err(e) = self.send_event(link, &event).await {
                        tracing::debug!(
                            event = event.name(),
                            error = %e,
                            "send failed"
                        );
                        return LinkEnd::Dropped(e.to_string());
                    }
                }

                _ = probe.tick() => {
                    // Keys must stay unique even if the wall clock stalls.
                    let client_time = pings
                        .last_key_value()
                        .map_or(0, |(last, _)| last + 1)
                        .max(wall_clock_millis());
                    pings.insert(client_time, Instant::now());
                    if pings.len() > MAX_PENDING_PINGS {
                        pings.pop_first();
                    }
                    let ping = ClientEvent::Ping(Ping { client_time });
                    if let Err(e) = self.send_event(link, &ping).await {
                        return LinkEnd::Dropped(e.to_string());
                    }
                }
            }
        }
    }
}

/// Owns a link from handshake to teardown, reconnecting when configured.
async fn supervise<C: Connector>(
    shared: Arc<Shared<C>>,
    mut link: Link<C::Connection>,
    mut endpoint: Option<String>,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    identity: Identity,
    epoch: u64,
) {
    loop {
        let conn_id = link.id();
        let join = ClientEvent::JoinGame(JoinGame {
            nickname: identity.nickname.clone(),
        });
        let end = match shared.send_event(&link, &join).await {
            Ok(()) => {
                shared.emit(
                    epoch,
                    SessionEvent::Connected {
                        endpoint: endpoint.clone(),
                        mode: link.mode(),
                    },
                );
                shared.drive(&link, &mut outbound, epoch).await
            }
            Err(e) => LinkEnd::Dropped(e.to_string()),
        };

        let reason = match end {
            LinkEnd::Cancelled => {
                tracing::debug!(%conn_id, "closing link");
                let _ = link.close().await;
                return;
            }
            LinkEnd::Dropped(reason) => reason,
        };
        if !shared.is_current(epoch) {
            // Dropped and cancelled together: the cancel wins.
            tracing::debug!(%conn_id, %reason, "link dropped after cancel");
            let _ = link.close().await;
            return;
        }

        tracing::info!(%conn_id, %reason, "connection lost");
        shared.latency_ms.store(NO_LATENCY, Ordering::Relaxed);
        shared.emit(
            epoch,
            SessionEvent::Disconnected {
                reason: reason.clone(),
            },
        );

        let can_retry = shared.config.auto_reconnect
            && link.mode() == LinkMode::Remote
            && shared.transition_in(epoch, ConnectionState::Reconnecting);
        if !can_retry {
            shared.transition_in(epoch, ConnectionState::Disconnected);
            return;
        }

        // Anything queued for the dead link is stale.
        while outbound.try_recv().is_ok() {}

        match shared.dial(epoch).await {
            Ok(Dialed::Established {
                conn,
                endpoint: url,
                attempts,
            }) => {
                if !shared.transition_in(epoch, ConnectionState::Connected) {
                    let _ = conn.close().await;
                    return;
                }
                tracing::info!(
                    endpoint = %url,
                    attempts,
                    "reconnected to game server"
                );
                link = Link::Remote(conn);
                endpoint = Some(url);
            }
            Ok(Dialed::Exhausted { attempts }) => {
                tracing::info!(
                    attempts,
                    "reconnect failed, staying disconnected"
                );
                shared.transition_in(epoch, ConnectionState::Disconnected);
                return;
            }
            Err(_) => return,
        }
    }
}

/// Locks a std mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
