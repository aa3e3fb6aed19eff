//! Turning sparse server positions into smooth motion.
//!
//! Positions arrive a few times a second at irregular intervals; frames are
//! drawn sixty times a second. Each update starts a short ease from wherever
//! the entity is drawn right now towards the new target:
//!
//! ```text
//! progress = clamp((now - anchor.started) / window, 0, 1)
//! eased    = progress * (2 - progress)        // ease-out quad
//! current  = lerp(anchor.start, target, eased)
//! ```
//!
//! Animation frames run on their own fixed cadence, independent of the ease.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tilesync_protocol::Direction;

use crate::entity::{
    AnimationKind, AnimationState, InterpolationAnchor, Position, RemoteEntity,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// How long one ease lasts.
    pub window: Duration,

    /// How long each animation frame is shown.
    pub frame_duration: Duration,

    /// How long an attack pulse lasts before the entity goes idle.
    pub attack_duration: Duration,

    /// Frames in the walk cycle. The cycle loops.
    pub walk_frames: usize,

    /// Frames in the attack animation. It holds on the last frame.
    pub attack_frames: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(100),
            frame_duration: Duration::from_millis(200),
            attack_duration: Duration::from_millis(800),
            walk_frames: 8,
            attack_frames: 3,
        }
    }
}

impl InterpolationConfig {
    /// Returns a copy with unusable values clamped.
    pub fn validated(&self) -> Self {
        let mut config = self.clone();

        if config.frame_duration.is_zero() {
            tracing::warn!("frame_duration of 0 is invalid, using 200ms");
            config.frame_duration = Duration::from_millis(200);
        }

        if config.walk_frames == 0 {
            tracing::warn!("walk_frames of 0 is invalid, clamping to 1");
            config.walk_frames = 1;
        }

        if config.attack_frames == 0 {
            tracing::warn!("attack_frames of 0 is invalid, clamping to 1");
            config.attack_frames = 1;
        }

        config
    }
}

/// Applies updates and advances time for remote entities.
#[derive(Debug, Clone, Default)]
pub struct RemoteEntityInterpolator {
    config: InterpolationConfig,
}

impl RemoteEntityInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Where the current ease puts the entity at `now`.
    pub fn sample(&self, entity: &RemoteEntity, now: Instant) -> Position {
        let progress = self.progress(entity, now);
        if progress >= 1.0 {
            return entity.target;
        }
        let eased = progress * (2.0 - progress);
        entity.anchor.start.lerp(entity.target, eased)
    }

    fn progress(&self, entity: &RemoteEntity, now: Instant) -> f64 {
        if self.config.window.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(entity.anchor.started);
        (elapsed.as_secs_f64() / self.config.window.as_secs_f64())
            .clamp(0.0, 1.0)
    }

    /// Starts easing towards a new server position.
    ///
    /// The ease starts from where the entity is drawn at `now`, so updates
    /// arriving faster than frames never make it jump back.
    pub fn on_update(
        &self,
        entity: &mut RemoteEntity,
        x: f64,
        y: f64,
        facing: Direction,
        moving: bool,
        now: Instant,
    ) {
        let from = self.sample(entity, now);
        entity.current = from;
        entity.anchor = InterpolationAnchor {
            start: from,
            started: now,
        };
        entity.target = Position::new(x, y);
        entity.facing = facing;
        entity.moving = moving;
        self.sync_animation(entity, now);
    }

    /// Starts an attack pulse. Returns when it should end; the caller owns
    /// that deadline and calls [`end_attack`] when it passes.
    ///
    /// `x`/`y` is recorded as the attack origin. It doesn't move the entity.
    ///
    /// [`end_attack`]: RemoteEntityInterpolator::end_attack
    pub fn on_attack(
        &self,
        entity: &mut RemoteEntity,
        facing: Direction,
        x: f64,
        y: f64,
        now: Instant,
    ) -> Instant {
        entity.facing = facing;
        entity.attacking = true;
        entity.attack_origin = Some(Position::new(x, y));
        // A second attack restarts the animation even though the kind is
        // already Attack.
        entity.animation = AnimationState::start(AnimationKind::Attack, now);
        now + self.config.attack_duration
    }

    /// Ends an attack pulse and returns the entity to idle.
    pub fn end_attack(&self, entity: &mut RemoteEntity, now: Instant) {
        entity.attacking = false;
        entity.animation = AnimationState::start(AnimationKind::Idle, now);
    }

    /// Advances the ease and the animation to `now`.
    pub fn tick(&self, entity: &mut RemoteEntity, now: Instant) {
        entity.current = self.sample(entity, now);
        self.advance_frames(entity, now);
    }

    fn sync_animation(&self, entity: &mut RemoteEntity, now: Instant) {
        let kind = AnimationKind::derive(entity.moving, entity.attacking);
        if kind != entity.animation.kind {
            entity.animation = AnimationState::start(kind, now);
        }
    }

    fn advance_frames(&self, entity: &mut RemoteEntity, now: Instant) {
        let animation = &mut entity.animation;
        if animation.kind == AnimationKind::Idle {
            animation.frame_index = 0;
            return;
        }

        let frame = self.config.frame_duration;
        let elapsed = now.saturating_duration_since(animation.frame_started);
        let steps = (elapsed.as_nanos() / frame.as_nanos()) as usize;
        if steps == 0 {
            return;
        }
        // Keep the remainder so the cadence doesn't drift with frame rate.
        animation.frame_started += frame * steps as u32;

        animation.frame_index = match animation.kind {
            AnimationKind::Walk => {
                (animation.frame_index + steps) % self.config.walk_frames
            }
            AnimationKind::Attack => (animation.frame_index + steps)
                .min(self.config.attack_frames - 1),
            AnimationKind::Idle => 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesync_protocol::PlayerState;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn entity_at(x: f64, y: f64, now: Instant) -> RemoteEntity {
        RemoteEntity::from_state(&PlayerState::new("p1", x, y), now)
    }

    #[test]
    fn test_tick_without_update_stays_put() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(10.0, 10.0, t0);
        interp.tick(&mut entity, t0);
        assert_eq!(entity.current, Position::new(10.0, 10.0));
        interp.tick(&mut entity, t0 + ms(500));
        assert_eq!(entity.current, Position::new(10.0, 10.0));
    }

    #[test]
    fn test_tick_halfway_uses_eased_progress() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);

        interp.on_update(&mut entity, 100.0, 100.0, Direction::Right, true, t0);
        interp.tick(&mut entity, t0 + ms(50));

        // progress 0.5 → eased 0.75
        assert!((entity.current.x - 75.0).abs() < 1e-9, "{:?}", entity.current);
        assert!((entity.current.y - 75.0).abs() < 1e-9);
        assert_eq!(entity.target, Position::new(100.0, 100.0));
    }

    #[test]
    fn test_tick_after_window_snaps_to_target() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);

        interp.on_update(&mut entity, 33.3, -7.1, Direction::Up, true, t0);
        for step in 1..=10 {
            interp.tick(&mut entity, t0 + ms(step * 13));
        }

        assert_eq!(entity.current, entity.target);
        assert_eq!(entity.current, Position::new(33.3, -7.1));
    }

    #[test]
    fn test_rapid_updates_rebase_from_in_flight_position() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);

        interp.on_update(&mut entity, 100.0, 0.0, Direction::Right, true, t0);
        // Second update before any tick, 50ms in: drawn position is 75.
        interp.on_update(&mut entity, 200.0, 0.0, Direction::Right, true, t0 + ms(50));

        assert!((entity.anchor.start.x - 75.0).abs() < 1e-9);
        assert_eq!(entity.anchor.started, t0 + ms(50));

        // No jump back towards the old raw target or the origin.
        interp.tick(&mut entity, t0 + ms(50));
        assert!((entity.current.x - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_on_update_resets_animation_when_moving_changes() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);

        interp.on_update(&mut entity, 5.0, 0.0, Direction::Right, true, t0);
        assert_eq!(entity.animation.kind, AnimationKind::Walk);
        interp.tick(&mut entity, t0 + ms(450));
        assert_eq!(entity.animation.frame_index, 2);

        // Still walking: frame keeps counting.
        interp.on_update(&mut entity, 9.0, 0.0, Direction::Right, true, t0 + ms(460));
        assert_eq!(entity.animation.frame_index, 2);

        interp.on_update(&mut entity, 9.0, 0.0, Direction::Right, false, t0 + ms(470));
        assert_eq!(entity.animation.kind, AnimationKind::Idle);
        assert_eq!(entity.animation.frame_index, 0);
    }

    #[test]
    fn test_walk_animation_loops() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);
        interp.on_update(&mut entity, 1.0, 0.0, Direction::Left, true, t0);

        // 9 frames of 200ms over an 8-frame cycle.
        interp.tick(&mut entity, t0 + ms(1800));
        assert_eq!(entity.animation.frame_index, 1);
    }

    #[test]
    fn test_attack_animation_holds_last_frame() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);

        let deadline = interp.on_attack(&mut entity, Direction::Left, 3.0, 4.0, t0);
        assert_eq!(deadline, t0 + ms(800));
        assert!(entity.attacking);
        assert_eq!(entity.attack_origin, Some(Position::new(3.0, 4.0)));
        // The origin doesn't move the entity.
        assert_eq!(entity.target, Position::new(0.0, 0.0));

        interp.tick(&mut entity, t0 + ms(700));
        assert_eq!(entity.animation.frame_index, 2);
    }

    #[test]
    fn test_end_attack_returns_to_idle() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::default();
        let mut entity = entity_at(0.0, 0.0, t0);
        interp.on_attack(&mut entity, Direction::Up, 0.0, 0.0, t0);

        interp.end_attack(&mut entity, t0 + ms(800));

        assert!(!entity.attacking);
        assert_eq!(entity.animation.kind, AnimationKind::Idle);
        assert_eq!(entity.animation.frame_index, 0);
    }

    #[test]
    fn test_zero_window_snaps_immediately() {
        let t0 = Instant::now();
        let interp = RemoteEntityInterpolator::new(InterpolationConfig {
            window: Duration::ZERO,
            ..InterpolationConfig::default()
        });
        let mut entity = entity_at(0.0, 0.0, t0);
        interp.on_update(&mut entity, 8.0, 8.0, Direction::Down, false, t0);
        interp.tick(&mut entity, t0);
        assert_eq!(entity.current, Position::new(8.0, 8.0));
    }

    #[test]
    fn test_validated_clamps_zero_frame_counts() {
        let config = InterpolationConfig {
            walk_frames: 0,
            attack_frames: 0,
            frame_duration: Duration::ZERO,
            ..InterpolationConfig::default()
        }
        .validated();
        assert_eq!(config.walk_frames, 1);
        assert_eq!(config.attack_frames, 1);
        assert_eq!(config.frame_duration, ms(200));
    }
}
