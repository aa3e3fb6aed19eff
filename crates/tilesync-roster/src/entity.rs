//! The remote entity model.

use std::time::Instant;

use tilesync_protocol::{AreaId, Direction, EntityId, PlayerState};

pub const DEFAULT_NICKNAME: &str = "Player";
pub const DEFAULT_COLOR: &str = "#4ECDC4";
pub const DEFAULT_HEALTH: u8 = 100;

/// A point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `to`. `t` is not clamped.
    pub fn lerp(self, to: Position, t: f64) -> Position {
        Position {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Which animation an entity is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimationKind {
    #[default]
    Idle,
    Walk,
    Attack,
}

impl AnimationKind {
    /// Attack wins over walking; walking over standing still.
    pub fn derive(moving: bool, attacking: bool) -> Self {
        if attacking {
            Self::Attack
        } else if moving {
            Self::Walk
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub kind: AnimationKind,
    pub frame_index: usize,
    pub frame_started: Instant,
}

impl AnimationState {
    pub fn start(kind: AnimationKind, now: Instant) -> Self {
        Self {
            kind,
            frame_index: 0,
            frame_started: now,
        }
    }
}

/// Where the current ease started, and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationAnchor {
    pub start: Position,
    pub started: Instant,
}

/// A remote player as this client sees it.
///
/// `target` is always the latest position the server reported. `current`
/// is what gets drawn, and converges on `target` as the entity ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntity {
    pub id: EntityId,
    pub display_name: String,
    pub current: Position,
    pub target: Position,
    pub facing: Direction,
    pub moving: bool,
    pub attacking: bool,
    pub health: u8,
    pub area: AreaId,
    pub color: String,
    pub anchor: InterpolationAnchor,
    pub animation: AnimationState,
    /// Server timestamp of the last position applied, when it sent one.
    pub last_server_timestamp: Option<u64>,
    /// Where the most recent attack originated.
    pub attack_origin: Option<Position>,
}

impl RemoteEntity {
    /// Builds an entity resting at the reported position. Fields the server
    /// left out take their defaults.
    pub fn from_state(state: &PlayerState, now: Instant) -> Self {
        let position = Position::new(state.x, state.y);
        let moving = state.is_moving.unwrap_or(false);
        Self {
            id: state.id.clone(),
            display_name: state
                .nickname
                .clone()
                .unwrap_or_else(|| DEFAULT_NICKNAME.to_owned()),
            current: position,
            target: position,
            facing: state.direction.unwrap_or_default(),
            moving,
            attacking: false,
            health: state.health.unwrap_or(DEFAULT_HEALTH),
            area: state.area.clone().unwrap_or_default(),
            color: state
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_COLOR.to_owned()),
            anchor: InterpolationAnchor {
                start: position,
                started: now,
            },
            animation: AnimationState::start(
                AnimationKind::derive(moving, false),
                now,
            ),
            last_server_timestamp: state.timestamp,
            attack_origin: None,
        }
    }

    /// Copies the descriptive fields the server sent, leaving position and
    /// animation alone.
    pub fn apply_metadata(&mut self, state: &PlayerState) {
        if let Some(nickname) = &state.nickname {
            self.display_name.clone_from(nickname);
        }
        if let Some(color) = &state.color {
            self.color.clone_from(color);
        }
        if let Some(health) = state.health {
            self.health = health;
        }
        if let Some(area) = &state.area {
            self.area = area.clone();
        }
    }
}
