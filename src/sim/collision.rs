//! Collision detection and response for oriented rectangles
//!
//! The tricky part of the arena: a separating-axis test between two rotated
//! hitboxes, extended with a swept check along the querying body's frame
//! velocity so fast bullets cannot tunnel through 8px walls, plus the minimum
//! translation vector used to push tanks out of walls.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::Rectangle;
use super::registry::EntityId;

/// Who a collider belongs to. A lookup handle only, never ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderOwner {
    /// Static map geometry
    Terrain,
    /// A registered entity
    Entity(EntityId),
}

/// An oriented hitbox bound to its owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    rect: Rectangle,
    owner: ColliderOwner,
    /// Tanks can drive through it
    passable: bool,
    /// Bullets are blocked by it
    stops_shots: bool,
}

impl Collider {
    pub fn new(rect: Rectangle, owner: ColliderOwner) -> Self {
        Self {
            rect,
            owner,
            passable: false,
            stops_shots: true,
        }
    }

    /// Collider for an entity: solid and shot-stopping by default
    pub fn for_entity(owner: EntityId, center: Vec2, width: f32, height: f32, angle: f32) -> Self {
        Self::new(
            Rectangle::new(center, width, height, angle),
            ColliderOwner::Entity(owner),
        )
    }

    /// Static terrain collider with explicit capability flags
    pub fn terrain(center: Vec2, width: f32, height: f32, passable: bool, stops_shots: bool) -> Self {
        Self {
            rect: Rectangle::axis_aligned(center, width, height),
            owner: ColliderOwner::Terrain,
            passable,
            stops_shots,
        }
    }

    pub fn with_flags(mut self, passable: bool, stops_shots: bool) -> Self {
        self.passable = passable;
        self.stops_shots = stops_shots;
        self
    }

    #[inline]
    pub fn rect(&self) -> &Rectangle {
        &self.rect
    }

    #[inline]
    pub fn owner(&self) -> ColliderOwner {
        self.owner
    }

    #[inline]
    pub fn passable(&self) -> bool {
        self.passable
    }

    #[inline]
    pub fn stops_shots(&self) -> bool {
        self.stops_shots
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    pub fn move_to(&mut self, center: Vec2) {
        self.rect.set_center(center);
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.rect.set_angle(angle);
    }

    pub fn rotate(&mut self, delta: f32) {
        self.rect.rotate(delta);
    }

    /// Check this collider against `other`, sweeping this one by `velocity`
    /// (its displacement for the current frame)
    pub fn check(&self, other: &Collider, velocity: Vec2) -> CollisionInfo {
        check_collision(self, other, velocity)
    }
}

/// Result of a collision check. Only valid for the frame that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionInfo {
    /// Overlapping at the current positions
    pub colliding: bool,
    /// Not overlapping now, but will overlap along the frame velocity
    pub will_collide: bool,
    /// Push-out vector for the querying body (zero unless `colliding`)
    pub minimum_translation: Vec2,
    /// Push-out distance along the separation axis (zero unless `colliding`)
    pub depth: f32,
    /// Unit contact normal pointing toward the querying body (for reflection)
    pub normal: Vec2,
}

impl CollisionInfo {
    pub fn miss() -> Self {
        Self {
            colliding: false,
            will_collide: false,
            minimum_translation: Vec2::ZERO,
            depth: 0.0,
            normal: Vec2::ZERO,
        }
    }

    /// Colliding now or predicted this frame
    #[inline]
    pub fn hit(&self) -> bool {
        self.colliding || self.will_collide
    }
}

/// Separating-axis check between two colliders.
///
/// Tests the four face normals (up/left of each rectangle). `velocity` is the
/// querying body's displacement this frame; the moving interval is stretched
/// along it to predict same-frame contact. A zero velocity never predicts.
/// Two colliders with the same owner never collide.
///
/// The MTV depth is the push-out distance toward `this` on the chosen axis,
/// which is larger than the interval overlap when one projection contains
/// the other.
pub fn check_collision(this: &Collider, other: &Collider, velocity: Vec2) -> CollisionInfo {
    if this.owner == other.owner {
        return CollisionInfo::miss();
    }

    let a = &this.rect;
    let b = &other.rect;
    let axes = [a.up_normal(), a.left_normal(), b.up_normal(), b.left_normal()];
    let offset = a.center() - b.center();
    let moving = velocity.length_squared() > f32::EPSILON;

    let mut colliding = true;
    let mut swept = moving;

    let mut min_depth = f32::INFINITY;
    let mut mtv_axis = Vec2::ZERO;
    // Axis with the widest gap before sweeping: the face the mover reaches last
    let mut max_gap = f32::NEG_INFINITY;
    let mut entry_axis = Vec2::ZERO;

    for axis in axes {
        let (min_a, max_a) = a.project(axis);
        let (min_b, max_b) = b.project(axis);
        let depth = max_a.min(max_b) - min_a.max(min_b);
        // Push-out distance toward self; equals `depth` unless one interval contains the other
        let (toward_self, push) = if offset.dot(axis) < 0.0 {
            (-axis, max_a - min_b)
        } else {
            (axis, max_b - min_a)
        };

        if depth <= 0.0 {
            colliding = false;
        } else if push < min_depth {
            min_depth = push;
            mtv_axis = toward_self;
        }

        if swept {
            let shift = velocity.dot(axis);
            let (swept_min, swept_max) = if shift < 0.0 {
                (min_a + shift, max_a)
            } else {
                (min_a, max_a + shift)
            };
            let swept_depth = swept_max.min(max_b) - swept_min.max(min_b);
            if swept_depth <= 0.0 {
                swept = false;
            } else if -depth > max_gap {
                max_gap = -depth;
                entry_axis = if shift > 0.0 {
                    -axis
                } else if shift < 0.0 {
                    axis
                } else {
                    toward_self
                };
            }
        }

        if !colliding && !swept {
            break;
        }
    }

    if colliding {
        return CollisionInfo {
            colliding: true,
            will_collide: false,
            minimum_translation: mtv_axis * min_depth,
            depth: min_depth,
            normal: mtv_axis,
        };
    }

    if swept {
        return CollisionInfo {
            colliding: false,
            will_collide: true,
            minimum_translation: Vec2::ZERO,
            depth: 0.0,
            normal: entry_axis,
        };
    }

    CollisionInfo::miss()
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}
