//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Frame time is clamped before it is integrated
//! - Seeded RNG only
//! - Stable iteration order (registration order per entity kind)
//! - No rendering or platform dependencies

pub mod collision;
pub mod entities;
pub mod geometry;
pub mod interaction;
pub mod registry;
pub mod state;
pub mod tick;

pub use collision::{Collider, ColliderOwner, CollisionInfo, check_collision, reflect_velocity};
pub use entities::{
    Bullet, BulletLaunch, Container, DestructibleBlock, Entity, EntityKind, Explosion, Player,
    PlayerControl, Powerup, PowerupKind,
};
pub use geometry::Rectangle;
pub use registry::{EntityId, Registry};
pub use state::{GameEvent, MatchPhase, MatchState, ScoreLine};
pub use tick::{FrameInput, advance};
