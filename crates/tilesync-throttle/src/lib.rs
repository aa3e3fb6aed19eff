//! Outbound state throttling.
//!
//! The local simulation runs every frame, but the server only needs to hear
//! about the local player when something visible changed. The
//! [`OutboundStateThrottle`] decides, frame by frame, whether the current
//! [`LocalPlayerState`] is worth sending:
//!
//! ```text
//! area changed or analog input engaged  → send now (forced flush)
//! less than min_interval since last send → hold
//! moved more than tolerance              → send
//! facing or moving flag changed          → send
//! otherwise                              → hold
//! ```
//!
//! The throttle has no idea how snapshots travel. It only produces them.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tilesync_protocol::{AreaId, Direction};

// ---------------------------------------------------------------------------
// ThrottleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum time between two non-forced sends.
    pub min_interval: Duration,

    /// A position change must exceed this many units on either axis.
    pub position_tolerance: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
            position_tolerance: 1.0,
        }
    }
}

impl ThrottleConfig {
    /// Returns a copy with unusable values clamped.
    pub fn validated(&self) -> Self {
        let mut config = self.clone();
        if !config.position_tolerance.is_finite()
            || config.position_tolerance < 0.0
        {
            tracing::warn!(
                tolerance = config.position_tolerance,
                "invalid position tolerance, clamping to 0"
            );
            config.position_tolerance = 0.0;
        }
        config
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// The local player as the simulation sees it this frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalPlayerState {
    pub x: f64,
    pub y: f64,
    pub facing: Direction,
    pub moving: bool,
    pub attacking: bool,
    pub area: AreaId,
}

/// What was (or will be) sent to the server. Coordinates are rounded, as
/// they are on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSnapshot {
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
    pub moving: bool,
    pub area: AreaId,
    pub timestamp: Instant,
}

impl OutboundSnapshot {
    pub fn capture(state: &LocalPlayerState, now: Instant) -> Self {
        Self {
            x: state.x.round() as i32,
            y: state.y.round() as i32,
            facing: state.facing,
            moving: state.moving,
            area: state.area.clone(),
            timestamp: now,
        }
    }
}

// ---------------------------------------------------------------------------
// OutboundStateThrottle
// ---------------------------------------------------------------------------

/// Decides when the local player's state goes out.
#[derive(Debug, Clone, Default)]
pub struct OutboundStateThrottle {
    config: ThrottleConfig,
    last_sent: Option<OutboundSnapshot>,
}

impl OutboundStateThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config: config.validated(),
            last_sent: None,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn last_sent(&self) -> Option<&OutboundSnapshot> {
        self.last_sent.as_ref()
    }

    /// Returns `true` if `current` should be sent at `now`.
    ///
    /// `input_engaged` is whether a continuous input device (an analog
    /// joystick) is held. It forces a send every call, like an area change.
    /// With nothing sent yet, always returns `true`.
    pub fn should_send(
        &self,
        current: &LocalPlayerState,
        input_engaged: bool,
        now: Instant,
    ) -> bool {
        let Some(last) = &self.last_sent else {
            return true;
        };

        if current.area != last.area || input_engaged {
            return true;
        }

        if now.saturating_duration_since(last.timestamp)
            < self.config.min_interval
        {
            return false;
        }

        let next = OutboundSnapshot::capture(current, now);
        let tolerance = self.config.position_tolerance;
        f64::from(next.x - last.x).abs() > tolerance
            || f64::from(next.y - last.y).abs() > tolerance
            || next.facing != last.facing
            || next.moving != last.moving
    }

    /// Remembers `snapshot` as the last thing sent.
    pub fn record_sent(&mut self, snapshot: OutboundSnapshot) {
        self.last_sent = Some(snapshot);
    }

    /// [`should_send`] and [`record_sent`] in one step. Returns the
    /// snapshot to transmit, if any.
    ///
    /// [`should_send`]: OutboundStateThrottle::should_send
    /// [`record_sent`]: OutboundStateThrottle::record_sent
    pub fn poll(
        &mut self,
        current: &LocalPlayerState,
        input_engaged: bool,
        now: Instant,
    ) -> Option<OutboundSnapshot> {
        if !self.should_send(current, input_engaged, now) {
            return None;
        }
        let snapshot = OutboundSnapshot::capture(current, now);
        tracing::trace!(
            x = snapshot.x,
            y = snapshot.y,
            area = %snapshot.area,
            "local state due for send"
        );
        self.record_sent(snapshot.clone());
        Some(snapshot)
    }

    /// Forgets the last send so the next poll goes out unconditionally.
    /// Used after a (re)connect so the server learns the position at once.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn at(x: f64, y: f64) -> LocalPlayerState {
        LocalPlayerState {
            x,
            y,
            ..LocalPlayerState::default()
        }
    }

    fn primed(state: &LocalPlayerState, now: Instant) -> OutboundStateThrottle {
        let mut throttle = OutboundStateThrottle::default();
        throttle.record_sent(OutboundSnapshot::capture(state, now));
        throttle
    }

    #[test]
    fn test_should_send_first_call_always_true() {
        let throttle = OutboundStateThrottle::default();
        assert!(throttle.should_send(&at(0.0, 0.0), false, Instant::now()));
    }

    #[test]
    fn test_should_send_within_interval_is_false() {
        let t0 = Instant::now();
        let throttle = primed(&at(0.0, 0.0), t0);
        assert!(!throttle.should_send(&at(50.0, 50.0), false, t0 + ms(49)));
    }

    #[test]
    fn test_should_send_after_interval_on_movement() {
        let t0 = Instant::now();
        let throttle = primed(&at(0.0, 0.0), t0);
        assert!(throttle.should_send(&at(2.0, 0.0), false, t0 + ms(50)));
        assert!(throttle.should_send(&at(0.0, -2.0), false, t0 + ms(50)));
    }

    #[test]
    fn test_should_send_ignores_movement_within_tolerance() {
        let t0 = Instant::now();
        let throttle = primed(&at(10.0, 10.0), t0);
        // 11.4 rounds to 11: one unit, not more than one.
        assert!(!throttle.should_send(&at(11.4, 9.0), false, t0 + ms(500)));
        // 11.6 rounds to 12.
        assert!(throttle.should_send(&at(11.6, 10.0), false, t0 + ms(500)));
    }

    #[test]
    fn test_should_send_on_facing_or_moving_change() {
        let t0 = Instant::now();
        let base = at(0.0, 0.0);
        let throttle = primed(&base, t0);

        let turned = LocalPlayerState {
            facing: Direction::Left,
            ..base.clone()
        };
        assert!(throttle.should_send(&turned, false, t0 + ms(60)));

        let walking = LocalPlayerState {
            moving: true,
            ..base
        };
        assert!(throttle.should_send(&walking, false, t0 + ms(60)));
    }

    #[test]
    fn test_should_send_attacking_alone_is_not_a_change() {
        let t0 = Instant::now();
        let base = at(0.0, 0.0);
        let throttle = primed(&base, t0);
        let swinging = LocalPlayerState {
            attacking: true,
            ..base
        };
        assert!(!throttle.should_send(&swinging, false, t0 + ms(60)));
    }

    #[test]
    fn test_should_send_area_change_bypasses_interval() {
        let t0 = Instant::now();
        let base = at(0.0, 0.0);
        let throttle = primed(&base, t0);
        let moved_area = LocalPlayerState {
            area: AreaId::from("left"),
            ..base
        };
        for elapsed in [0, 1, 10, 49] {
            assert!(
                throttle.should_send(&moved_area, false, t0 + ms(elapsed)),
                "area change held back at {elapsed}ms"
            );
        }
    }

    #[test]
    fn test_should_send_engaged_input_bypasses_interval() {
        let t0 = Instant::now();
        let base = at(0.0, 0.0);
        let throttle = primed(&base, t0);
        assert!(throttle.should_send(&base, true, t0 + ms(1)));
    }

    #[test]
    fn test_poll_records_rounded_snapshot() {
        let t0 = Instant::now();
        let mut throttle = OutboundStateThrottle::default();
        let snapshot = throttle.poll(&at(10.6, -3.4), false, t0).unwrap();
        assert_eq!((snapshot.x, snapshot.y), (11, -3));
        assert_eq!(throttle.last_sent(), Some(&snapshot));
    }

    #[test]
    fn test_reset_forces_next_send() {
        let t0 = Instant::now();
        let state = at(0.0, 0.0);
        let mut throttle = primed(&state, t0);
        assert!(throttle.poll(&state, false, t0 + ms(1)).is_none());

        throttle.reset();

        assert!(throttle.poll(&state, false, t0 + ms(2)).is_some());
    }

    #[test]
    fn test_validated_clamps_negative_tolerance() {
        let config = ThrottleConfig {
            position_tolerance: -3.0,
            ..ThrottleConfig::default()
        };
        assert_eq!(config.validated().position_tolerance, 0.0);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: ThrottleConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ThrottleConfig::default());
        assert_eq!(config.min_interval, ms(50));
    }
}
