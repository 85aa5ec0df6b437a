//! Per-frame simulation step
//!
//! [`advance`] is the only entry point a frontend needs: feed it the frame's
//! input and the wall-clock time since the last frame.

use serde::{Deserialize, Serialize};

use super::entities::{Entity, EntityKind, PlayerControl};
use super::interaction::{resolve_bullets, resolve_players};
use super::state::{GameEvent, MatchPhase, MatchState};
use crate::audio::{AudioSink, SoundEffect};
use crate::consts::*;
use crate::settings::MatchMode;

/// Input for a single frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Controls per player slot (index 0 is player 1)
    pub controls: [PlayerControl; MAX_PLAYERS],
    /// Pause toggle
    pub pause: bool,
}

/// Advance the match by one frame
pub fn advance(state: &mut MatchState, input: &FrameInput, elapsed_ms: u32, audio: &mut dyn AudioSink) {
    state.events.clear();
    // Long stalls are integrated as one short slice
    let elapsed_ms = elapsed_ms.min(MAX_FRAME_MS);

    if input.pause {
        match state.phase {
            MatchPhase::Playing => {
                log::info!("Paused");
                state.phase = MatchPhase::Paused;
                return;
            }
            MatchPhase::Paused => {
                log::info!("Resumed");
                state.phase = MatchPhase::Playing;
            }
            _ => {}
        }
    }

    match state.phase {
        MatchPhase::Paused | MatchPhase::Finished => return,
        _ => {}
    }

    state.elapsed_ms += elapsed_ms as u64;
    update_match_clock(state, elapsed_ms);
    if state.is_finished() {
        return;
    }

    state.update_container_spawn(elapsed_ms);
    apply_controls(state, input, audio);
    resolve_players(state, elapsed_ms, audio);
    update_players(state, elapsed_ms);
    resolve_bullets(state, elapsed_ms, audio);
    update_effects(state, elapsed_ms);
    reclaim(state);

    log::trace!(
        "frame {}ms: {} entities, {} events",
        elapsed_ms,
        state.registry.len(),
        state.events.len()
    );
}

/// Count down the match clock and the ending grace period, and check the
/// win condition while playing
fn update_match_clock(state: &mut MatchState, elapsed_ms: u32) {
    match state.phase {
        MatchPhase::Ending { remaining_ms } => {
            let remaining_ms = remaining_ms - elapsed_ms as i32;
            state.phase = if remaining_ms <= 0 {
                log::info!("Match finished after {}ms", state.elapsed_ms);
                MatchPhase::Finished
            } else {
                MatchPhase::Ending { remaining_ms }
            };
        }
        MatchPhase::Playing => {
            if state.settings.mode == MatchMode::Time {
                state.remaining_ms = (state.remaining_ms - elapsed_ms as i64).max(0);
            }
            if let Some(winners) = state.evaluate_winners() {
                log::info!("Match over ({}): winners {:?}", state.settings.mode.as_str(), winners);
                state.winners = winners.clone();
                state.phase = MatchPhase::Ending {
                    remaining_ms: GAME_END_MS,
                };
                state.emit(GameEvent::MatchEnded { winners });
            }
        }
        MatchPhase::Paused | MatchPhase::Finished => {}
    }
}

/// Copy each slot's controls onto its tank and handle the fire button
fn apply_controls(state: &mut MatchState, input: &FrameInput, audio: &mut dyn AudioSink) {
    for player_id in state.players.clone() {
        let Some(player) = state.player_mut(player_id) else {
            continue;
        };
        if player.is_dead() {
            continue;
        }
        let slot = (player.number - 1) as usize;
        player.control = input.controls.get(slot).copied().unwrap_or_default();

        if !player.wants_to_fire() {
            continue;
        }
        let number = player.number;
        if let Some(launch) = player.fire() {
            state.spawn_bullet(player_id, launch);
            audio.play(SoundEffect::Fire);
            state.emit(GameEvent::BulletFired { player: number });
        }
    }
}

/// Move tanks; any that end up outside the arena go back to their start
fn update_players(state: &mut MatchState, elapsed_ms: u32) {
    let bounds = state.bounds();
    for player_id in state.players.clone() {
        let Some(player) = state.player_mut(player_id) else {
            continue;
        };
        if player.is_dead() {
            continue;
        }
        player.update(elapsed_ms, bounds);

        let pos = player.position();
        if pos.x < 0.0 || pos.x > bounds.x || pos.y < 0.0 || pos.y > bounds.y {
            log::warn!(
                "Player {} left the arena at ({:.1}, {:.1}), resetting",
                player.number,
                pos.x,
                pos.y
            );
            let spawn = player.spawn_point();
            player.set_position(spawn);
        }
    }
}

/// Timers of purely time-driven entities
fn update_effects(state: &mut MatchState, elapsed_ms: u32) {
    for kind in [EntityKind::Explosion, EntityKind::Powerup] {
        for id in state.registry.snapshot(kind) {
            match state.registry.get_mut(id) {
                Some(Entity::Explosion(explosion)) if !explosion.is_dead() => explosion.update(elapsed_ms),
                Some(Entity::Powerup(powerup)) => powerup.update(elapsed_ms),
                _ => {}
            }
        }
    }
}

/// Tombstone every dead entity except players, then reclaim them all
fn reclaim(state: &mut MatchState) {
    for kind in [
        EntityKind::Bullet,
        EntityKind::Container,
        EntityKind::Block,
        EntityKind::Powerup,
        EntityKind::Explosion,
    ] {
        for id in state.registry.snapshot(kind) {
            if state.registry.get(id).is_some_and(Entity::is_dead) {
                state.registry.despawn(id);
            }
        }
    }
    let reclaimed = state.registry.sweep();
    if !reclaimed.is_empty() {
        log::debug!("Reclaimed {} entities", reclaimed.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::map::TileMap;
    use crate::settings::MatchSettings;
    use glam::Vec2;

    const FRAME: u32 = 16;

    fn new_match(mode: MatchMode, players_in: [bool; MAX_PLAYERS]) -> MatchState {
        let settings = MatchSettings {
            players_in,
            seed: 42,
            ..MatchSettings::for_mode(mode)
        };
        MatchState::new(settings, TileMap::open_arena())
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn run(state: &mut MatchState, input: &FrameInput, frames: usize) {
        for _ in 0..frames {
            advance(state, input, FRAME, &mut NullAudio);
        }
    }

    /// Simple scripted driving: circle around and fire in bursts
    fn bot_input(frame: usize) -> FrameInput {
        let mut input = FrameInput::default();
        for (slot, control) in input.controls.iter_mut().enumerate() {
            let phase = (frame / 40 + slot) % 4;
            control.forward = if phase == 3 { -0.5 } else { 1.0 };
            control.rotation = match phase {
                0 => 0.6,
                2 => -0.4,
                _ => 0.0,
            };
            control.turret = if slot % 2 == 0 { 0.3 } else { -0.3 };
            control.fire = (frame + slot * 7) % 20 < 10;
        }
        input
    }

    #[test]
    fn test_frame_time_is_clamped() {
        let mut state = new_match(MatchMode::Time, [true; MAX_PLAYERS]);
        advance(&mut state, &idle(), 5000, &mut NullAudio);
        assert_eq!(state.elapsed_ms, MAX_FRAME_MS as u64);
        assert_eq!(state.remaining_ms, 120_000 - MAX_FRAME_MS as i64);
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut state = new_match(MatchMode::Time, [true; MAX_PLAYERS]);
        let pause = FrameInput {
            pause: true,
            ..idle()
        };

        advance(&mut state, &pause, FRAME, &mut NullAudio);
        assert_eq!(state.phase, MatchPhase::Paused);
        run(&mut state, &idle(), 10);
        assert_eq!(state.elapsed_ms, 0);

        advance(&mut state, &pause, FRAME, &mut NullAudio);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.elapsed_ms, FRAME as u64);
    }

    #[test]
    fn test_fire_spawns_one_bullet_per_press() {
        let mut state = new_match(MatchMode::Time, [true, false, false, false]);
        let p1 = state.players[0];
        let player = state.player_mut(p1).unwrap();
        player.max_bullets = 3;
        // Aim at the open middle so nothing comes back
        player.set_turret_angle(180.0);

        let mut input = idle();
        input.controls[0].fire = true;
        let mut audio: Vec<SoundEffect> = Vec::new();
        advance(&mut state, &input, FRAME, &mut audio);
        assert_eq!(audio, vec![SoundEffect::Fire]);
        assert_eq!(state.events, vec![GameEvent::BulletFired { player: 1 }]);

        // Holding the button does not refire
        for _ in 0..30 {
            advance(&mut state, &input, FRAME, &mut audio);
        }
        assert_eq!(state.registry.count_alive(EntityKind::Bullet), 1);
        assert_eq!(state.player(p1).unwrap().live_bullets(), 1);

        // Release, wait out the cooldown, press again
        advance(&mut state, &idle(), FRAME, &mut audio);
        advance(&mut state, &input, FRAME, &mut audio);
        assert_eq!(state.player(p1).unwrap().live_bullets(), 2);
    }

    #[test]
    fn test_bullet_dies_at_wall_and_is_reclaimed() {
        let mut state = new_match(MatchMode::Time, [true, false, false, false]);
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().max_bounce = 0;

        let mut input = idle();
        input.controls[0].fire = true;
        advance(&mut state, &input, FRAME, &mut NullAudio);
        assert_eq!(state.registry.ids(EntityKind::Bullet).len(), 1);

        // Straight up into the top wall, well within a few hundred frames
        run(&mut state, &idle(), 60);
        assert!(state.registry.ids(EntityKind::Bullet).is_empty());
        assert_eq!(state.player(p1).unwrap().live_bullets(), 0);

        // The explosion outlives the bullet, then is reclaimed too
        run(&mut state, &idle(), (EXPLOSION_MS as usize / FRAME as usize) + 2);
        assert!(state.registry.ids(EntityKind::Explosion).is_empty());
    }

    #[test]
    fn test_tank_stops_at_wall() {
        let mut state = new_match(MatchMode::Time, [true, false, false, false]);
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().set_angle(270.0);

        let mut input = idle();
        input.controls[0].forward = 1.0;
        run(&mut state, &input, 100);

        let x = state.player(p1).unwrap().position().x;
        let step = MOVE_SPEED * FRAME as f32 / REFERENCE_TICK_MS;
        assert!(x >= TILE_SIZE + PLAYER_SIZE / 2.0 - step - 1e-3, "x = {x}");
        assert!(x <= TILE_SIZE + PLAYER_SIZE / 2.0 + step);
    }

    #[test]
    fn test_out_of_arena_resets_to_start() {
        let mut state = new_match(MatchMode::Time, [true, false, false, false]);
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().set_position(Vec2::new(400.0, 100.0));
        advance(&mut state, &idle(), FRAME, &mut NullAudio);
        let player = state.player(p1).unwrap();
        assert_eq!(player.position(), player.spawn_point());
    }

    #[test]
    fn test_score_match_ends_after_grace_period() {
        let mut state = new_match(MatchMode::Score, [true, true, false, false]);
        let p2 = state.players[1];
        let target = state.settings.score_target;
        state.player_mut(p2).unwrap().add_score(target);

        advance(&mut state, &idle(), FRAME, &mut NullAudio);
        assert_eq!(
            state.phase,
            MatchPhase::Ending {
                remaining_ms: GAME_END_MS
            }
        );
        assert_eq!(state.winners, vec![2]);
        assert!(state.events.contains(&GameEvent::MatchEnded { winners: vec![2] }));

        run(&mut state, &idle(), GAME_END_MS as usize / FRAME as usize + 1);
        assert!(state.is_finished());

        // Finished matches don't move
        let elapsed = state.elapsed_ms;
        run(&mut state, &idle(), 5);
        assert_eq!(state.elapsed_ms, elapsed);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_time_match_ends_on_clock() {
        let mut settings = MatchSettings::for_mode(MatchMode::Time);
        settings.time_limit_secs = 1;
        settings.players_in = [true, true, false, false];
        let mut state = MatchState::new(settings, TileMap::open_arena());
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().add_score(1);

        run(&mut state, &idle(), 1000 / FRAME as usize);
        assert_eq!(state.phase, MatchPhase::Playing);
        run(&mut state, &idle(), 1);
        assert!(matches!(state.phase, MatchPhase::Ending { .. }));
        assert_eq!(state.winners, vec![1]);
    }

    #[test]
    fn test_stock_match_ends_with_last_tank() {
        let mut state = new_match(MatchMode::Stock, [true, true, true, false]);
        for index in [0, 2] {
            let id = state.players[index];
            state.player_mut(id).unwrap().die();
        }
        advance(&mut state, &idle(), FRAME, &mut NullAudio);
        assert_eq!(state.winners, vec![2]);
    }

    #[test]
    fn test_pause_ignored_once_ending() {
        let mut state = new_match(MatchMode::Score, [true, true, false, false]);
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().add_score(100);
        advance(&mut state, &idle(), FRAME, &mut NullAudio);

        let pause = FrameInput {
            pause: true,
            ..idle()
        };
        advance(&mut state, &pause, FRAME, &mut NullAudio);
        assert!(matches!(state.phase, MatchPhase::Ending { .. }));
    }

    #[test]
    fn test_bullet_counters_stay_consistent() {
        let mut state = new_match(MatchMode::Time, [true; MAX_PLAYERS]);
        for frame in 0..3000 {
            advance(&mut state, &bot_input(frame), FRAME, &mut NullAudio);

            for player_id in state.players.clone() {
                let in_flight = state
                    .registry
                    .ids(EntityKind::Bullet)
                    .iter()
                    .filter_map(|id| state.registry.get(*id).and_then(Entity::as_bullet))
                    .filter(|b| b.owner() == player_id)
                    .count() as u32;
                let player = state.player(player_id).unwrap();
                assert_eq!(player.live_bullets(), in_flight, "frame {frame}");
                assert!(player.live_bullets() <= player.max_bullets);
            }
            // Nothing dead survives a frame
            for kind in [EntityKind::Bullet, EntityKind::Explosion, EntityKind::Powerup, EntityKind::Container] {
                assert_eq!(state.registry.ids(kind).len(), state.registry.count_alive(kind));
            }
        }
    }

    #[test]
    fn test_same_seed_same_match() {
        let play = || {
            let mut state = new_match(MatchMode::Time, [true; MAX_PLAYERS]);
            let mut audio: Vec<SoundEffect> = Vec::new();
            for frame in 0..2000 {
                advance(&mut state, &bot_input(frame), FRAME, &mut audio);
            }
            let positions: Vec<Vec2> = state
                .players
                .iter()
                .filter_map(|id| state.player(*id))
                .map(|p| p.position())
                .collect();
            (state.scoreboard(), positions, state.registry.len(), audio)
        };
        assert_eq!(play(), play());
    }
}
