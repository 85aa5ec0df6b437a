//! Tank Arena - simulation core for a top-down arena shooter
//!
//! Core modules:
//! - `sim`: Frame simulation (collision, entity lifecycle, interaction rules)
//! - `map`: Tile layout and static colliders
//! - `settings`: Match configuration
//! - `audio`: Fire-and-forget sound triggers

pub mod audio;
pub mod map;
pub mod settings;
pub mod sim;

pub use map::{MapError, TileMap};
pub use settings::{MatchMode, MatchSettings};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Arena dimensions (pixels)
    pub const ARENA_WIDTH: f32 = 320.0;
    pub const ARENA_HEIGHT: f32 = 240.0;

    /// Tile grid
    pub const TILE_SIZE: f32 = 8.0;
    pub const MAP_ROWS: usize = 30;
    pub const MAP_COLS: usize = 40;

    /// Longest frame slice fed to the simulation (ms)
    pub const MAX_FRAME_MS: u32 = 30;
    /// Velocities are px/s; frame displacement = velocity * elapsed_ms / REFERENCE_TICK_MS
    pub const REFERENCE_TICK_MS: f32 = 1000.0;

    pub const MAX_PLAYERS: usize = 4;

    /// Player tank
    pub const PLAYER_SIZE: f32 = 16.0;
    pub const MOVE_SPEED: f32 = 40.0;
    /// Degrees per second at full stick
    pub const ROTATE_SPEED: f32 = 180.0;
    /// Move speed bonus per speed level
    pub const SPEED_LEVEL_BONUS: f32 = 0.25;
    pub const FIRE_COOLDOWN_MS: u32 = 250;
    pub const INVINCIBLE_MS: i32 = 3000;
    pub const FLASH_MS: u32 = 100;

    /// Upgrade defaults and caps
    pub const DEFAULT_MAX_BULLETS: u32 = 1;
    pub const DEFAULT_MAX_BOUNCE: u32 = 1;
    pub const MAX_BULLETS_CAP: u32 = 5;
    pub const MAX_BOUNCE_CAP: u32 = 5;
    pub const MAX_SPEED_LEVEL: u32 = 3;

    /// Bullets
    pub const BULLET_SIZE: f32 = 4.0;
    pub const BULLET_SPEED: f32 = 100.0;
    /// Distance ahead of the tank center where bullets appear
    pub const MUZZLE_OFFSET: f32 = 8.0;

    /// Pickups and terrain
    pub const CONTAINER_SIZE: f32 = 16.0;
    pub const BLOCK_SIZE: f32 = 8.0;
    pub const POWERUP_SIZE: f32 = 8.0;
    pub const POWERUP_LIFETIME_MS: i32 = 15_000;
    pub const BRITTLE_BLOCK_HP: u32 = 1;
    pub const STURDY_BLOCK_HP: u32 = 3;

    pub const EXPLOSION_MS: i32 = 400;

    /// Grace period between a win condition and the end of the match
    pub const GAME_END_MS: i32 = 3000;

    pub const MIN_STOCK: u32 = 1;
    pub const MAX_STOCK: u32 = 9;
}

/// Wrap an angle in degrees to [0, 360)
#[inline]
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Unit heading for an angle in degrees, clockwise from up (screen y grows downward)
#[inline]
pub fn heading(angle_deg: f32) -> Vec2 {
    let a = angle_deg.to_radians();
    Vec2::new(a.sin(), -a.cos())
}

/// Inverse of [`heading`]: angle in degrees, clockwise from up, in [0, 360)
#[inline]
pub fn heading_to_degrees(dir: Vec2) -> f32 {
    wrap_degrees(dir.x.atan2(-dir.y).to_degrees())
}
