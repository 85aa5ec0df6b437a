//! Per-frame interaction resolver
//!
//! Two passes run every frame:
//!
//! 1. **Player pass**: each live tank is pushed out of solid terrain, other
//!    tanks, blocks and containers by the minimum translation vector, then
//!    collects any powerup it overlaps.
//! 2. **Bullet pass**: each live bullet moves, then runs a fixed fallback
//!    chain (blocks, containers, players, bullets, terrain). The chain stops as
//!    soon as the bullet dies.
//!
//! Nothing is removed here. Dead entities only get their flag set; the tick
//! reclaims them after both passes.

use glam::Vec2;

use super::collision::{Collider, CollisionInfo};
use super::entities::{Entity, EntityKind};
use super::registry::EntityId;
use super::state::{GameEvent, MatchState};
use crate::audio::{AudioSink, SoundEffect};
use crate::settings::MatchMode;

/// Mark a bullet dead and release its slot in the owner's bullet count.
/// Returns false if it was already dead, so the count drops exactly once.
pub fn kill_bullet(state: &mut MatchState, bullet_id: EntityId) -> bool {
    let Some(bullet) = state.registry.get_mut(bullet_id).and_then(Entity::as_bullet_mut) else {
        return false;
    };
    if bullet.is_dead() {
        return false;
    }
    bullet.die();
    let owner = bullet.owner();
    if let Some(player) = state.player_mut(owner) {
        player.destroy_bullet();
    }
    true
}

// === Player pass ===

/// Push tanks out of everything solid and hand out powerups
pub fn resolve_players(state: &mut MatchState, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    for player_id in state.players.clone() {
        // Sweep with last frame's velocity; the tank has not moved yet
        let velocity = match state.player(player_id) {
            Some(player) if !player.is_dead() => player.frame_velocity(elapsed_ms),
            _ => continue,
        };
        push_out_of_terrain(state, player_id, velocity);
        push_out_of_bodies(state, player_id, velocity);
        collect_powerups(state, player_id, velocity, audio);
    }
}

fn push_out_of_terrain(state: &mut MatchState, player_id: EntityId, velocity: Vec2) {
    let MatchState { map, registry, .. } = state;
    let Some(player) = registry.get_mut(player_id).and_then(Entity::as_player_mut) else {
        return;
    };
    for collider in map.colliders().iter().filter(|c| !c.passable()) {
        let info = player.collider().check(collider, velocity);
        if info.colliding {
            player.translate(info.minimum_translation);
        }
    }
}

fn push_out_of_bodies(state: &mut MatchState, player_id: EntityId, velocity: Vec2) {
    let obstacles: Vec<Collider> = [EntityKind::Player, EntityKind::Block, EntityKind::Container]
        .iter()
        .flat_map(|kind| state.registry.ids(*kind))
        .filter(|id| **id != player_id && state.registry.is_live(**id))
        .filter_map(|id| state.registry.get(*id))
        .filter(|entity| !entity.is_dead())
        .filter_map(|entity| entity.collider().cloned())
        .collect();

    let Some(player) = state.player_mut(player_id) else {
        return;
    };
    for obstacle in &obstacles {
        let info = player.collider().check(obstacle, velocity);
        if info.colliding {
            player.translate(info.minimum_translation);
        }
    }
}

fn collect_powerups(
    state: &mut MatchState,
    player_id: EntityId,
    velocity: Vec2,
    audio: &mut dyn AudioSink,
) {
    for powerup_id in state.registry.snapshot(EntityKind::Powerup) {
        let touching = match (
            state.player(player_id),
            state.registry.get(powerup_id).and_then(Entity::as_powerup),
        ) {
            (Some(player), Some(powerup)) if !powerup.is_dead() => {
                player.collider().check(powerup.collider(), velocity).colliding
            }
            _ => false,
        };
        if !touching {
            continue;
        }

        let Some((Entity::Powerup(powerup), Entity::Player(player))) =
            state.registry.pair_mut(powerup_id, player_id)
        else {
            continue;
        };
        let kind = powerup.kind;
        let number = player.number;
        if let Some(sound) = powerup.apply(player) {
            audio.play(sound);
            log::debug!("Player {number} collected {kind:?}");
            state.emit(GameEvent::PowerupCollected { player: number, kind });
        }
    }
}

// === Bullet pass ===

type BulletStage = fn(&mut MatchState, EntityId, u32, &mut dyn AudioSink);

/// Fallback order for a bullet's checks
const BULLET_CHAIN: [BulletStage; 5] = [
    bullet_vs_blocks,
    bullet_vs_containers,
    bullet_vs_players,
    bullet_vs_bullets,
    bullet_vs_terrain,
];

/// Move every live bullet and resolve what it hits
pub fn resolve_bullets(state: &mut MatchState, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    for bullet_id in state.registry.snapshot(EntityKind::Bullet) {
        if !state.registry.is_live(bullet_id) {
            continue;
        }
        match state.registry.get_mut(bullet_id).and_then(Entity::as_bullet_mut) {
            Some(bullet) if !bullet.is_dead() => bullet.update(elapsed_ms),
            _ => continue,
        }

        for stage in BULLET_CHAIN {
            stage(state, bullet_id, elapsed_ms, audio);
            if !bullet_alive(state, bullet_id) {
                break;
            }
        }
    }
}

fn bullet_alive(state: &MatchState, bullet_id: EntityId) -> bool {
    state
        .registry
        .get(bullet_id)
        .and_then(Entity::as_bullet)
        .is_some_and(|b| !b.is_dead())
}

/// The bullet's hitbox and sweep vector, or `None` once it is dead
fn bullet_probe(state: &MatchState, bullet_id: EntityId, elapsed_ms: u32) -> Option<(Collider, Vec2)> {
    let bullet = state.registry.get(bullet_id).and_then(Entity::as_bullet)?;
    if bullet.is_dead() {
        return None;
    }
    Some((bullet.collider().clone(), bullet.frame_velocity(elapsed_ms)))
}

fn bullet_position(state: &MatchState, bullet_id: EntityId) -> Vec2 {
    state
        .registry
        .get(bullet_id)
        .map(Entity::position)
        .unwrap_or_default()
}

fn bounce_bullet(state: &mut MatchState, bullet_id: EntityId, info: &CollisionInfo) {
    if let Some(bullet) = state.registry.get_mut(bullet_id).and_then(Entity::as_bullet_mut) {
        bullet.bounce(info);
        let pos = bullet.position();
        state.emit(GameEvent::BulletBounced { pos });
    }
}

/// Kill the bullet and leave an explosion where it was
fn detonate_bullet(state: &mut MatchState, bullet_id: EntityId) {
    let pos = bullet_position(state, bullet_id);
    if kill_bullet(state, bullet_id) {
        state.spawn_explosion(pos);
    }
}

fn bullet_vs_blocks(state: &mut MatchState, bullet_id: EntityId, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    for block_id in state.registry.snapshot(EntityKind::Block) {
        let Some((probe, velocity)) = bullet_probe(state, bullet_id, elapsed_ms) else {
            return;
        };
        let info = match state.registry.get(block_id).and_then(Entity::as_block) {
            Some(block) if !block.is_dead() => probe.check(block.collider(), velocity),
            _ => continue,
        };
        if !info.hit() {
            continue;
        }

        audio.play(SoundEffect::BulletHitBrick);
        let Some(block) = state.registry.get_mut(block_id).and_then(Entity::as_block_mut) else {
            continue;
        };
        let destroyed = block.damage();
        let (pos, contents, deflects) = (block.position(), block.contents, block.deflects);

        if destroyed {
            kill_bullet(state, bullet_id);
            log::debug!("Block destroyed at ({:.0}, {:.0})", pos.x, pos.y);
            state.emit(GameEvent::BlockDestroyed { pos });
            if let Some(kind) = contents {
                state.spawn_powerup(pos, kind);
            }
            state.spawn_explosion(pos);
            return;
        }

        let can_bounce = state
            .registry
            .get(bullet_id)
            .and_then(Entity::as_bullet)
            .is_some_and(|b| b.can_bounce());
        if deflects && can_bounce {
            bounce_bullet(state, bullet_id, &info);
        } else {
            detonate_bullet(state, bullet_id);
        }
        // One block per bullet per frame
        return;
    }
}

fn bullet_vs_containers(
    state: &mut MatchState,
    bullet_id: EntityId,
    elapsed_ms: u32,
    audio: &mut dyn AudioSink,
) {
    let Some((probe, velocity)) = bullet_probe(state, bullet_id, elapsed_ms) else {
        return;
    };
    let hit = state
        .registry
        .ids(EntityKind::Container)
        .iter()
        .copied()
        .find(|id| match state.registry.get(*id).and_then(Entity::as_container) {
            Some(container) => !container.is_dead() && probe.check(container.collider(), velocity).colliding,
            None => false,
        });
    let Some(container_id) = hit else {
        return;
    };
    let Some(container) = state.registry.get_mut(container_id).and_then(Entity::as_container_mut) else {
        return;
    };

    // Containers break on any hit
    container.die();
    let (pos, contents) = (container.position(), container.contents);
    audio.play(SoundEffect::BulletHitBrick);
    kill_bullet(state, bullet_id);
    state.spawn_powerup(pos, contents);
    state.spawn_explosion(pos);
}

fn bullet_vs_players(state: &mut MatchState, bullet_id: EntityId, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    let Some((probe, velocity)) = bullet_probe(state, bullet_id, elapsed_ms) else {
        return;
    };
    let Some((owner, bounced)) = state
        .registry
        .get(bullet_id)
        .and_then(Entity::as_bullet)
        .map(|b| (b.owner(), b.bounces() > 0))
    else {
        return;
    };

    let target = state.players.iter().copied().find(|id| {
        let Some(player) = state.player(*id) else {
            return false;
        };
        if player.is_dead() || player.is_invincible() {
            return false;
        }
        // A fresh shell can't hit its own tank
        if *id == owner && !bounced {
            return false;
        }
        probe.check(player.collider(), velocity).colliding
    });

    if let Some(target) = target {
        hit_player(state, bullet_id, owner, target, audio);
    }
}

fn hit_player(
    state: &mut MatchState,
    bullet_id: EntityId,
    shooter_id: EntityId,
    target_id: EntityId,
    audio: &mut dyn AudioSink,
) {
    let self_hit = shooter_id == target_id;
    let shooter = state.player_mut(shooter_id).map(|shooter| {
        shooter.add_score(if self_hit { -1 } else { 1 });
        shooter.number
    });

    let stock = state.settings.mode == MatchMode::Stock;
    let Some(target) = state.player_mut(target_id) else {
        return;
    };
    let pos = target.position();
    let number = target.number;
    let eliminated = stock && target.lives <= 1;
    if eliminated {
        target.lose_life();
        target.die();
    } else {
        if stock {
            target.lose_life();
        }
        target.respawn();
    }

    state.spawn_explosion(pos);
    audio.play(SoundEffect::PlayerDied);
    log::debug!(
        "Player {number} hit by player {}{}",
        shooter.unwrap_or(0),
        if self_hit { " (self)" } else { "" }
    );
    state.emit(GameEvent::PlayerHit {
        target: number,
        shooter: shooter.unwrap_or(0),
    });
    if eliminated {
        log::info!("Player {number} eliminated");
        state.emit(GameEvent::PlayerEliminated { player: number });
    }
    kill_bullet(state, bullet_id);
}

fn bullet_vs_bullets(state: &mut MatchState, bullet_id: EntityId, elapsed_ms: u32, _audio: &mut dyn AudioSink) {
    let Some((probe, velocity)) = bullet_probe(state, bullet_id, elapsed_ms) else {
        return;
    };
    let Some(this) = state.registry.get(bullet_id).and_then(Entity::as_bullet) else {
        return;
    };

    let other_id = state
        .registry
        .ids(EntityKind::Bullet)
        .iter()
        .copied()
        .filter(|id| *id != bullet_id)
        .find(|id| match state.registry.get(*id).and_then(Entity::as_bullet) {
            // Bullets flying the same way never meet
            Some(other) => {
                !other.is_dead()
                    && !this.same_direction(other)
                    && probe.check(other.collider(), velocity).hit()
            }
            None => false,
        });

    if let Some(other_id) = other_id {
        let pos = bullet_position(state, bullet_id);
        kill_bullet(state, bullet_id);
        kill_bullet(state, other_id);
        state.spawn_explosion(pos);
    }
}

fn bullet_vs_terrain(state: &mut MatchState, bullet_id: EntityId, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    let Some((probe, velocity)) = bullet_probe(state, bullet_id, elapsed_ms) else {
        return;
    };
    let hit = state
        .map
        .colliders()
        .iter()
        .filter(|c| c.stops_shots())
        .map(|c| probe.check(c, velocity))
        .find(CollisionInfo::hit);
    let Some(info) = hit else {
        return;
    };

    let can_bounce = state
        .registry
        .get(bullet_id)
        .and_then(Entity::as_bullet)
        .is_some_and(|b| b.can_bounce());
    if can_bounce {
        audio.play(SoundEffect::Bounce);
        bounce_bullet(state, bullet_id, &info);
    } else {
        audio.play(SoundEffect::BulletHitWall);
        detonate_bullet(state, bullet_id);
    }
}
