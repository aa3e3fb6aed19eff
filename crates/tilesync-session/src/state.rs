//! Connection lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Where the session is in its lifecycle.
///
/// ```text
/// Disconnected → Connecting → Connected ⇄ Reconnecting
///                     │
///                     └──→ OfflineFallback
/// ```
///
/// Any state may go to `Disconnected`: an explicit disconnect always wins.
/// Every other edge is guarded by [`ConnectionState::can_transition_to`].
///
/// - **Disconnected**: no link. Gameplay is singleplayer.
/// - **Connecting**: walking the endpoint list.
/// - **Connected**: linked to a real server.
/// - **Reconnecting**: a live link dropped and the endpoint list is being
///   walked again.
/// - **OfflineFallback**: every endpoint failed; an in-process peer stands
///   in for the server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    OfflineFallback,
}

impl ConnectionState {
    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, Connected | OfflineFallback)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
        )
    }

    /// Returns `true` if outbound game events are accepted in this state.
    pub fn accepts_sends(self) -> bool {
        matches!(self, Self::Connected | Self::OfflineFallback)
    }

    /// Returns `true` if a link attempt or a link is in progress.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::OfflineFallback => write!(f, "OfflineFallback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_can_transition_to_follows_connect_path() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connecting.can_transition_to(OfflineFallback));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Connected));
    }

    #[test]
    fn test_can_transition_to_rejects_skips() {
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Connecting));
        assert!(!OfflineFallback.can_transition_to(Connected));
        assert!(!Reconnecting.can_transition_to(OfflineFallback));
        assert!(!Connecting.can_transition_to(Connecting));
    }

    #[test]
    fn test_can_transition_to_disconnected_from_anywhere() {
        for state in [
            Disconnected,
            Connecting,
            Connected,
            Reconnecting,
            OfflineFallback,
        ] {
            assert!(state.can_transition_to(Disconnected), "{state}");
        }
    }

    #[test]
    fn test_accepts_sends_only_when_linked() {
        assert!(Connected.accepts_sends());
        assert!(OfflineFallback.accepts_sends());
        assert!(!Connecting.accepts_sends());
        assert!(!Reconnecting.accepts_sends());
        assert!(!Disconnected.accepts_sends());
    }
}
