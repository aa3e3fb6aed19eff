//! A headless player: joins a game server, walks a square, swings every few
//! seconds and logs what it sees.
//!
//! Configured from the environment:
//!
//! - `TILESYNC_CONFIG`: path to a JSON `SyncConfig` (optional)
//! - `TILESYNC_ENDPOINTS`: comma-separated server URLs, tried in order
//! - `TILESYNC_NICKNAME`: name to join with (default `HeadlessBot`)
//! - `RUST_LOG`: log filter (default `info`)

use std::time::{Duration, Instant};

use tilesync::prelude::*;
use tilesync::session::Endpoint;
use tilesync::{is_mirrored, sprite_name};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);
const SPEED: f64 = 2.0;
const SIDE: f64 = 120.0;
const ATTACK_EVERY: u64 = 180;
const REPORT_EVERY: u64 = 120;

// ---------------------------------------------------------------------------
// Scripted walker
// ---------------------------------------------------------------------------

/// Walks the edges of a square, one leg per side.
struct Walker {
    state: LocalPlayerState,
    leg: usize,
    travelled: f64,
}

impl Walker {
    const LEGS: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    fn new(x: f64, y: f64) -> Self {
        Self {
            state: LocalPlayerState {
                x,
                y,
                facing: Direction::Right,
                moving: true,
                ..LocalPlayerState::default()
            },
            leg: 0,
            travelled: 0.0,
        }
    }

    fn step(&mut self) {
        if self.travelled >= SIDE {
            self.leg = (self.leg + 1) % Self::LEGS.len();
            self.travelled = 0.0;
        }
        let facing = Self::LEGS[self.leg];
        let (dx, dy) = match facing {
            Direction::Right => (SPEED, 0.0),
            Direction::Left => (-SPEED, 0.0),
            Direction::Up => (0.0, -SPEED),
            _ => (0.0, SPEED),
        };
        self.state.x += dx;
        self.state.y += dy;
        self.state.facing = facing;
        self.travelled += SPEED;
    }
}

/// The bot's "stick" is always pushed along its current leg.
struct Autopilot(Direction);

impl InputSource for Autopilot {
    fn is_pressed(&self, action: Action) -> bool {
        matches!(
            (action, self.0),
            (Action::Up, Direction::Up)
                | (Action::Down, Direction::Down)
                | (Action::Left, Direction::Left)
                | (Action::Right, Direction::Right)
        )
    }
}

// ---------------------------------------------------------------------------
// Log renderer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LogRenderer {
    frames: u64,
}

impl Renderer for LogRenderer {
    fn render(&mut self, view: &FrameView<'_>, local: &LocalPlayerState) {
        self.frames += 1;
        if self.frames % REPORT_EVERY != 0 {
            return;
        }
        tracing::info!(
            mode = ?view.play_mode,
            connection = %view.connection,
            latency_ms = view.latency.map(|l| l.as_millis() as u64),
            local_id = view.local_id.map(|id| id.as_str()),
            remote = view.remote_count,
            x = local.x,
            y = local.y,
            "frame {}",
            self.frames
        );
        for entity in &view.visible {
            tracing::info!(
                entity_id = %entity.id,
                name = %entity.display_name,
                x = entity.current.x,
                y = entity.current.y,
                sprite = %sprite_name(entity.facing, entity.animation.kind),
                mirrored = is_mirrored(entity.facing),
                frame = entity.animation.frame_index,
                "  remote"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn load_config() -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::var("TILESYNC_CONFIG") {
        Ok(path) => SyncConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        Err(_) => SyncConfig::default(),
    };
    if let Ok(urls) = std::env::var("TILESYNC_ENDPOINTS") {
        config.session.endpoints = parse_endpoints(&urls);
    }
    if config.session.endpoints.is_empty() {
        config.session.endpoints.push(Endpoint::new("ws://localhost:3001"));
    }
    Ok(config)
}

fn parse_endpoints(urls: &str) -> Vec<Endpoint> {
    urls.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(Endpoint::new)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let nickname = std::env::var("TILESYNC_NICKNAME")
        .unwrap_or_else(|_| "HeadlessBot".to_owned());
    let mut controller = GameSessionController::builder(WebSocketConnector)
        .config(load_config()?)
        .nickname(nickname)
        .build()?;

    let connecting = tokio::spawn(controller.connect());

    let mut walker = Walker::new(400.0, 300.0);
    let mut renderer = LogRenderer::default();
    let mut ticker = tokio::time::interval(FRAME);
    let mut frame_no: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }
        frame_no += 1;

        walker.step();
        let input = Autopilot(walker.state.facing);
        if frame_no % ATTACK_EVERY == 0 {
            controller.attack(&walker.state);
        }

        let view = controller.frame(&walker.state, &input, Instant::now());
        renderer.render(&view, &walker.state);
        for notice in controller.take_notices() {
            tracing::info!("{notice}");
        }
    }

    tracing::info!("shutting down");
    controller.disconnect();
    connecting.abort();
    Ok(())
}
