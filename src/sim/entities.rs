//! Arena entities and their per-frame state advance
//!
//! Every entity carries a position, a collider (except explosions), a dead
//! flag and an `update(elapsed_ms)` rule. The [`Entity`] sum type replaces a
//! class hierarchy: the interaction resolver matches on kinds instead of
//! calling virtual methods.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{Collider, CollisionInfo, reflect_velocity};
use super::registry::EntityId;
use crate::audio::SoundEffect;
use crate::consts::*;
use crate::{heading, heading_to_degrees, wrap_degrees};

/// Displacement for `velocity` (px/s) over `elapsed_ms`
#[inline]
pub fn frame_displacement(velocity: Vec2, elapsed_ms: u32) -> Vec2 {
    velocity * (elapsed_ms as f32 / REFERENCE_TICK_MS)
}

/// Player stick/button state for one frame, each axis in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerControl {
    /// Forward (+) / reverse (-) throttle
    pub forward: f32,
    /// Body rotation, clockwise positive
    pub rotation: f32,
    /// Turret rotation relative to the body, clockwise positive
    pub turret: f32,
    /// Fire button held
    pub fire: bool,
}

/// A player tank
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Player number, 1..=4
    pub number: u8,
    pub score: i32,
    pub lives: u32,
    pos: Vec2,
    /// Body angle in degrees, clockwise from up
    angle: f32,
    /// Turret angle in degrees, clockwise from up
    turret_angle: f32,
    /// Velocity from the last update (px/s)
    velocity: Vec2,
    pub control: PlayerControl,
    collider: Collider,
    spawn_point: Vec2,
    pub max_bullets: u32,
    /// Bullets currently in flight
    live_bullets: u32,
    pub max_bounce: u32,
    pub speed_level: u32,
    fire_cooldown_ms: u32,
    fire_was_held: bool,
    invincible_ms: i32,
    flash_ms: u32,
    invisible: bool,
    dead: bool,
}

impl Player {
    pub fn new(id: EntityId, number: u8, spawn_point: Vec2, lives: u32) -> Self {
        Self {
            number,
            score: 0,
            lives,
            pos: spawn_point,
            angle: 0.0,
            turret_angle: 0.0,
            velocity: Vec2::ZERO,
            control: PlayerControl::default(),
            collider: Collider::for_entity(id, spawn_point, PLAYER_SIZE, PLAYER_SIZE, 0.0),
            spawn_point,
            max_bullets: DEFAULT_MAX_BULLETS,
            live_bullets: 0,
            max_bounce: DEFAULT_MAX_BOUNCE,
            speed_level: 0,
            fire_cooldown_ms: 0,
            fire_was_held: false,
            invincible_ms: 0,
            flash_ms: 0,
            invisible: false,
            dead: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
        self.collider.move_to(pos);
    }

    /// Apply a positional correction (e.g. a minimum translation vector)
    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.pos + delta);
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = wrap_degrees(angle);
        self.collider.set_angle(self.angle);
    }

    #[inline]
    pub fn turret_angle(&self) -> f32 {
        self.turret_angle
    }

    pub fn set_turret_angle(&mut self, angle: f32) {
        self.turret_angle = wrap_degrees(angle);
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Displacement this frame, used as the sweep vector
    pub fn frame_velocity(&self, elapsed_ms: u32) -> Vec2 {
        frame_displacement(self.velocity, elapsed_ms)
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    #[inline]
    pub fn spawn_point(&self) -> Vec2 {
        self.spawn_point
    }

    #[inline]
    pub fn live_bullets(&self) -> u32 {
        self.live_bullets
    }

    pub fn move_speed(&self) -> f32 {
        MOVE_SPEED * (1.0 + SPEED_LEVEL_BONUS * self.speed_level as f32)
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn die(&mut self) {
        self.dead = true;
        self.velocity = Vec2::ZERO;
    }

    #[inline]
    pub fn is_invincible(&self) -> bool {
        self.invincible_ms > 0
    }

    /// False during the off phase of the invincibility flicker
    #[inline]
    pub fn is_visible(&self) -> bool {
        !self.dead && !self.invisible
    }

    pub fn make_invincible(&mut self) {
        self.invincible_ms = INVINCIBLE_MS;
        self.flash_ms = 0;
        log::debug!("Player {} is invincible", self.number);
    }

    pub fn add_score(&mut self, delta: i32) {
        self.score += delta;
    }

    pub fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
    }

    /// Move back to the start position and become briefly invincible
    pub fn respawn(&mut self) {
        self.set_position(self.spawn_point);
        self.velocity = Vec2::ZERO;
        self.make_invincible();
    }

    /// One of this player's bullets is gone
    pub fn destroy_bullet(&mut self) {
        self.live_bullets = self.live_bullets.saturating_sub(1);
    }

    /// Edge-triggered fire: true on the frame the button goes down, when ready
    pub fn wants_to_fire(&mut self) -> bool {
        let pressed = self.control.fire && !self.fire_was_held;
        self.fire_was_held = self.control.fire;
        pressed && self.fire_cooldown_ms == 0
    }

    /// Spawn parameters for a new bullet, or `None` if this player can't fire now.
    /// Counts the bullet as live on success.
    pub fn fire(&mut self) -> Option<BulletLaunch> {
        if self.dead || self.live_bullets >= self.max_bullets || self.fire_cooldown_ms > 0 {
            return None;
        }
        self.live_bullets += 1;
        self.fire_cooldown_ms = FIRE_COOLDOWN_MS;

        let direction = heading(self.turret_angle);
        Some(BulletLaunch {
            pos: self.pos + direction * MUZZLE_OFFSET,
            angle: self.turret_angle,
            direction,
            max_bounce: self.max_bounce,
        })
    }

    /// Advance the tank by `elapsed_ms` inside an arena of `bounds` size
    pub fn update(&mut self, elapsed_ms: u32, bounds: Vec2) {
        if self.dead {
            return;
        }
        let dt = elapsed_ms as f32 / REFERENCE_TICK_MS;

        if self.invincible_ms > 0 {
            self.invincible_ms -= elapsed_ms as i32;
            self.flash_ms += elapsed_ms;
            if self.flash_ms >= FLASH_MS {
                self.invisible = !self.invisible;
                self.flash_ms = 0;
            }
            if self.invincible_ms <= 0 {
                self.invincible_ms = 0;
                self.flash_ms = 0;
                self.invisible = false;
            }
        } else {
            self.invisible = false;
        }

        self.fire_cooldown_ms = self.fire_cooldown_ms.saturating_sub(elapsed_ms);

        let forward = self.control.forward.clamp(-1.0, 1.0);
        let rotation = self.control.rotation.clamp(-1.0, 1.0) * ROTATE_SPEED * dt;
        let turret_rotation = self.control.turret.clamp(-1.0, 1.0) * ROTATE_SPEED * dt;

        self.set_angle(self.angle + rotation);
        // The turret turns with the body
        self.set_turret_angle(self.turret_angle + rotation + turret_rotation);

        self.velocity = heading(self.angle) * forward * self.move_speed();
        let step = frame_displacement(self.velocity, elapsed_ms);
        let half = PLAYER_SIZE / 2.0;

        // An axis that would leave the arena freezes instead of clamping
        let mut pos = self.pos;
        if (step.x < 0.0 && pos.x > half) || (step.x > 0.0 && pos.x + half < bounds.x) {
            pos.x += step.x;
        }
        if (step.y < 0.0 && pos.y > half) || (step.y > 0.0 && pos.y + half < bounds.y) {
            pos.y += step.y;
        }
        self.set_position(pos);
    }
}

/// Everything needed to register a freshly fired bullet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletLaunch {
    pub pos: Vec2,
    pub angle: f32,
    pub direction: Vec2,
    pub max_bounce: u32,
}

/// A projectile
#[derive(Debug, Clone, Serialize)]
pub struct Bullet {
    owner: EntityId,
    pos: Vec2,
    angle: f32,
    direction: Vec2,
    speed: f32,
    bounces: u32,
    max_bounce: u32,
    collider: Collider,
    dead: bool,
}

impl Bullet {
    pub fn new(id: EntityId, owner: EntityId, launch: BulletLaunch) -> Self {
        Self {
            owner,
            pos: launch.pos,
            angle: launch.angle,
            direction: launch.direction.normalize_or_zero(),
            speed: BULLET_SPEED,
            bounces: 0,
            max_bounce: launch.max_bounce,
            collider: Collider::for_entity(id, launch.pos, BULLET_SIZE, BULLET_SIZE, launch.angle),
            dead: false,
        }
    }

    /// The player that fired it
    #[inline]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    #[inline]
    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    #[inline]
    pub fn max_bounce(&self) -> u32 {
        self.max_bounce
    }

    /// Bounce budget left
    #[inline]
    pub fn can_bounce(&self) -> bool {
        self.bounces < self.max_bounce
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    pub fn frame_velocity(&self, elapsed_ms: u32) -> Vec2 {
        frame_displacement(self.direction * self.speed, elapsed_ms)
    }

    /// Travelling the same way as `other` (parallel bullets never interact)
    pub fn same_direction(&self, other: &Bullet) -> bool {
        self.direction.abs_diff_eq(other.direction, 1e-4)
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn die(&mut self) {
        self.dead = true;
    }

    /// Reflect off the surface described by `coll` and spend one bounce
    pub fn bounce(&mut self, coll: &CollisionInfo) {
        if coll.colliding {
            self.pos += coll.minimum_translation;
        }
        self.direction = reflect_velocity(self.direction, coll.normal).normalize_or_zero();
        self.angle = heading_to_degrees(self.direction);
        self.bounces += 1;
        self.collider.set_angle(self.angle);
        self.collider.move_to(self.pos);
    }

    /// Constant-speed flight along the direction vector
    pub fn update(&mut self, elapsed_ms: u32) {
        if self.dead {
            return;
        }
        self.pos += self.frame_velocity(elapsed_ms);
        self.collider.move_to(self.pos);
    }
}

/// Powerup effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    /// Faster tank
    Speed,
    /// One more bounce per bullet
    Bounce,
    /// One more bullet in flight
    Bullet,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 3] = [PowerupKind::Speed, PowerupKind::Bounce, PowerupKind::Bullet];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn sound(self) -> SoundEffect {
        match self {
            PowerupKind::Speed => SoundEffect::PowerupSpeed,
            PowerupKind::Bounce => SoundEffect::PowerupBounce,
            PowerupKind::Bullet => SoundEffect::PowerupBullet,
        }
    }
}

/// A supply crate that pops open into a powerup when shot
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pos: Vec2,
    pub contents: PowerupKind,
    collider: Collider,
    dead: bool,
}

impl Container {
    pub fn new(id: EntityId, pos: Vec2, contents: PowerupKind) -> Self {
        Self {
            pos,
            contents,
            collider: Collider::for_entity(id, pos, CONTAINER_SIZE, CONTAINER_SIZE, 0.0),
            dead: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn die(&mut self) {
        self.dead = true;
    }
}

/// A breakable map block
#[derive(Debug, Clone, Serialize)]
pub struct DestructibleBlock {
    pos: Vec2,
    hp: u32,
    pub contents: Option<PowerupKind>,
    /// Bullets with bounce budget ricochet off it instead of being absorbed
    pub deflects: bool,
    collider: Collider,
    dead: bool,
}

impl DestructibleBlock {
    pub fn new(id: EntityId, pos: Vec2, hp: u32, contents: Option<PowerupKind>, deflects: bool) -> Self {
        Self {
            pos,
            hp: hp.max(1),
            contents,
            deflects,
            collider: Collider::for_entity(id, pos, BLOCK_SIZE, BLOCK_SIZE, 0.0),
            dead: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn hp(&self) -> u32 {
        self.hp
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    /// Take one hit. Returns true if the block was destroyed by it.
    pub fn damage(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.hp = self.hp.saturating_sub(1);
        if self.hp == 0 {
            self.dead = true;
        }
        self.dead
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn die(&mut self) {
        self.dead = true;
    }
}

/// A pickup lying on the ground
#[derive(Debug, Clone, Serialize)]
pub struct Powerup {
    pos: Vec2,
    pub kind: PowerupKind,
    remaining_ms: i32,
    collider: Collider,
    dead: bool,
}

impl Powerup {
    pub fn new(id: EntityId, pos: Vec2, kind: PowerupKind) -> Self {
        Self {
            pos,
            kind,
            remaining_ms: POWERUP_LIFETIME_MS,
            collider: Collider::for_entity(id, pos, POWERUP_SIZE, POWERUP_SIZE, 0.0)
                .with_flags(true, false),
            dead: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    #[inline]
    pub fn remaining_ms(&self) -> i32 {
        self.remaining_ms
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    /// Buff `player` and use up the powerup. Applies at most once.
    pub fn apply(&mut self, player: &mut Player) -> Option<SoundEffect> {
        if self.dead {
            return None;
        }
        match self.kind {
            PowerupKind::Speed => player.speed_level = (player.speed_level + 1).min(MAX_SPEED_LEVEL),
            PowerupKind::Bounce => player.max_bounce = (player.max_bounce + 1).min(MAX_BOUNCE_CAP),
            PowerupKind::Bullet => player.max_bullets = (player.max_bullets + 1).min(MAX_BULLETS_CAP),
        }
        self.dead = true;
        Some(self.kind.sound())
    }

    /// Expire after lying around too long
    pub fn update(&mut self, elapsed_ms: u32) {
        if self.dead {
            return;
        }
        self.remaining_ms -= elapsed_ms as i32;
        if self.remaining_ms <= 0 {
            self.dead = true;
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn die(&mut self) {
        self.dead = true;
    }
}

/// Purely visual; dies when its timer runs out
#[derive(Debug, Clone, Serialize)]
pub struct Explosion {
    pos: Vec2,
    remaining_ms: i32,
    dead: bool,
}

impl Explosion {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            remaining_ms: EXPLOSION_MS,
            dead: false,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// Animation progress in [0, 1]
    pub fn progress(&self) -> f32 {
        1.0 - (self.remaining_ms.max(0) as f32 / EXPLOSION_MS as f32)
    }

    pub fn update(&mut self, elapsed_ms: u32) {
        self.remaining_ms -= elapsed_ms as i32;
        if self.remaining_ms <= 0 {
            self.dead = true;
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

/// Entity categories, one registry list each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Bullet,
    Container,
    Block,
    Powerup,
    Explosion,
}

impl EntityKind {
    pub const COUNT: usize = 6;

    #[inline]
    pub fn index(self) -> usize {
        match self {
            EntityKind::Player => 0,
            EntityKind::Bullet => 1,
            EntityKind::Container => 2,
            EntityKind::Block => 3,
            EntityKind::Powerup => 4,
            EntityKind::Explosion => 5,
        }
    }
}

/// Any registered entity
#[derive(Debug, Clone, Serialize)]
pub enum Entity {
    Player(Player),
    Bullet(Bullet),
    Container(Container),
    Block(DestructibleBlock),
    Powerup(Powerup),
    Explosion(Explosion),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Bullet(_) => EntityKind::Bullet,
            Entity::Container(_) => EntityKind::Container,
            Entity::Block(_) => EntityKind::Block,
            Entity::Powerup(_) => EntityKind::Powerup,
            Entity::Explosion(_) => EntityKind::Explosion,
        }
    }

    pub fn position(&self) -> Vec2 {
        match self {
            Entity::Player(p) => p.position(),
            Entity::Bullet(b) => b.position(),
            Entity::Container(c) => c.position(),
            Entity::Block(d) => d.position(),
            Entity::Powerup(p) => p.position(),
            Entity::Explosion(e) => e.position(),
        }
    }

    /// Explosions have no hitbox
    pub fn collider(&self) -> Option<&Collider> {
        match self {
            Entity::Player(p) => Some(p.collider()),
            Entity::Bullet(b) => Some(b.collider()),
            Entity::Container(c) => Some(c.collider()),
            Entity::Block(d) => Some(d.collider()),
            Entity::Powerup(p) => Some(p.collider()),
            Entity::Explosion(_) => None,
        }
    }

    pub fn is_dead(&self) -> bool {
        match self {
            Entity::Player(p) => p.is_dead(),
            Entity::Bullet(b) => b.is_dead(),
            Entity::Container(c) => c.is_dead(),
            Entity::Block(d) => d.is_dead(),
            Entity::Powerup(p) => p.is_dead(),
            Entity::Explosion(e) => e.is_dead(),
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            Entity::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match self {
            Entity::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bullet(&self) -> Option<&Bullet> {
        match self {
            Entity::Bullet(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bullet_mut(&mut self) -> Option<&mut Bullet> {
        match self {
            Entity::Bullet(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Entity::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Entity::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&DestructibleBlock> {
        match self {
            Entity::Block(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut DestructibleBlock> {
        match self {
            Entity::Block(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_powerup(&self) -> Option<&Powerup> {
        match self {
            Entity::Powerup(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_powerup_mut(&mut self) -> Option<&mut Powerup> {
        match self {
            Entity::Powerup(p) => Some(p),
            _ => None,
        }
    }
}
