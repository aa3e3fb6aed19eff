//! Boundaries to the rest of the game: input, rendering and sprites.
//!
//! The sync core never draws or reads a keyboard. It talks to those parts
//! of the game through these traits.

use tilesync_protocol::Direction;
use tilesync_roster::{AnimationKind, RemoteEntity};
use tilesync_throttle::LocalPlayerState;

use crate::FrameView;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Discrete actions the player can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Attack,
}

/// An analog stick reading. `direction` is a unit vector when `magnitude`
/// is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JoystickState {
    pub active: bool,
    pub direction: (f64, f64),
    pub magnitude: f64,
}

/// Where player input comes from.
pub trait InputSource {
    fn is_pressed(&self, action: Action) -> bool;

    /// The analog stick, on devices that have one.
    fn joystick(&self) -> Option<JoystickState> {
        None
    }

    /// Whether continuous analog input is being held right now. While it
    /// is, every frame's state is sent regardless of the send interval.
    fn is_analog_engaged(&self) -> bool {
        self.joystick().is_some_and(|stick| stick.active)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Draws one frame.
pub trait Renderer {
    fn render(&mut self, view: &FrameView<'_>, local: &LocalPlayerState);
}

// ---------------------------------------------------------------------------
// Sprites
// ---------------------------------------------------------------------------

/// Frame layout of one sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteInfo {
    pub frame_count: usize,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Loads and tints sprite frames.
pub trait SpriteProvider {
    type Sprite;

    /// Frame `frame` of sheet `name`, tinted with `color` (`#RRGGBB`).
    fn sprite(&self, name: &str, frame: usize, color: &str)
    -> Option<Self::Sprite>;

    fn sprite_info(&self, name: &str) -> Option<SpriteInfo>;
}

/// Sheet name for a facing and animation, e.g. `link_walk_front`.
///
/// There is no right-facing sheet: right uses the left one, mirrored (see
/// [`is_mirrored`]). Idle shows the walk sheet.
pub fn sprite_name(facing: Direction, kind: AnimationKind) -> String {
    let side = match facing.normalized() {
        Direction::Up => "back",
        Direction::Left | Direction::Right => "left",
        _ => "front",
    };
    let action = match kind {
        AnimationKind::Attack => "attack",
        AnimationKind::Walk | AnimationKind::Idle => "walk",
    };
    format!("link_{action}_{side}")
}

/// Whether the sheet for `facing` must be drawn flipped horizontally.
pub fn is_mirrored(facing: Direction) -> bool {
    facing == Direction::Right
}

/// Looks up the sprite a remote entity should show this frame.
///
/// The entity's frame index is wrapped to the sheet's frame count, so a
/// sheet shorter than the configured animation never goes out of range.
pub fn sprite_for<P: SpriteProvider>(
    provider: &P,
    entity: &RemoteEntity,
) -> Option<P::Sprite> {
    let name = sprite_name(entity.facing, entity.animation.kind);
    let frames = provider.sprite_info(&name)?.frame_count.max(1);
    provider.sprite(&name, entity.animation.frame_index % frames, &entity.color)
}
