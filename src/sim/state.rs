//! Match state and spawn helpers
//!
//! Everything a running match owns lives in one [`MatchState`] that is passed
//! by reference into [`advance`](super::tick::advance). There are no globals.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::entities::{
    Bullet, BulletLaunch, Container, DestructibleBlock, Entity, EntityKind, Explosion, Player,
    Powerup, PowerupKind,
};
use super::registry::{EntityId, Registry};
use crate::consts::*;
use crate::map::TileMap;
use crate::settings::{MatchMode, MatchSettings};

/// Current phase of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchPhase {
    /// Active gameplay
    Playing,
    /// Time is not integrated
    Paused,
    /// A win condition was met; play continues until the grace period runs out
    Ending { remaining_ms: i32 },
    /// Match over, advancing is a no-op
    Finished,
}

/// Gameplay events emitted during one frame (for UI, effects, logs)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    BulletFired { player: u8 },
    BulletBounced { pos: Vec2 },
    ExplosionSpawned { pos: Vec2 },
    PowerupSpawned { kind: PowerupKind, pos: Vec2 },
    PowerupCollected { player: u8, kind: PowerupKind },
    BlockDestroyed { pos: Vec2 },
    PlayerHit { target: u8, shooter: u8 },
    PlayerEliminated { player: u8 },
    ContainerSpawned { pos: Vec2 },
    MatchEnded { winners: Vec<u8> },
}

/// One scoreboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreLine {
    pub player: u8,
    pub score: i32,
    pub lives: u32,
    pub eliminated: bool,
    pub winner: bool,
}

/// Complete state of a running match
#[derive(Debug, Clone, Serialize)]
pub struct MatchState {
    pub settings: MatchSettings,
    pub map: TileMap,
    pub registry: Registry,
    /// Participating players, in player-number order
    pub players: Vec<EntityId>,
    pub phase: MatchPhase,
    /// Simulated time since the match started
    pub elapsed_ms: u64,
    /// Time mode countdown
    pub remaining_ms: i64,
    /// Countdown to the next container spawn attempt
    pub container_spawn_ms: i32,
    /// Player numbers that met the win condition
    pub winners: Vec<u8>,
    /// Events from the most recent frame
    pub events: Vec<GameEvent>,
    #[serde(skip)]
    rng: Pcg32,
}

impl MatchState {
    /// Set up a match: register map blocks, then one tank per participating slot
    pub fn new(settings: MatchSettings, map: TileMap) -> Self {
        let settings = settings.normalized();
        let mut rng = Pcg32::seed_from_u64(settings.seed);
        let container_spawn_ms = Self::roll_spawn_delay(&settings, &mut rng);

        let mut state = Self {
            remaining_ms: settings.time_limit_ms(),
            settings,
            map,
            registry: Registry::new(),
            players: Vec::with_capacity(MAX_PLAYERS),
            phase: MatchPhase::Playing,
            elapsed_ms: 0,
            container_spawn_ms,
            winners: Vec::new(),
            events: Vec::new(),
            rng,
        };

        let placements = state.map.blocks().to_vec();
        for block in placements {
            // One block in four hides a powerup
            let contents = if state.rng.random_range(0..4) == 0 {
                Some(PowerupKind::random(&mut state.rng))
            } else {
                None
            };
            state.registry.spawn_with(|id| {
                Entity::Block(DestructibleBlock::new(id, block.pos, block.hp, contents, block.deflects))
            });
        }

        let lives = state.settings.effective_stock();
        for slot in 0..MAX_PLAYERS {
            if !state.settings.players_in[slot] {
                continue;
            }
            let number = slot as u8 + 1;
            let spawn = state.map.start_position(number);
            let id = state
                .registry
                .spawn_with(|id| Entity::Player(Player::new(id, number, spawn, lives)));
            state.players.push(id);
        }

        log::info!(
            "Match start: {} mode, {} players, {} blocks, seed {}",
            state.settings.mode.as_str(),
            state.players.len(),
            state.registry.ids(EntityKind::Block).len(),
            state.settings.seed
        );
        state
    }

    fn roll_spawn_delay(settings: &MatchSettings, rng: &mut Pcg32) -> i32 {
        let delay = rng.random_range(settings.container_spawn_min_ms..=settings.container_spawn_max_ms);
        i32::try_from(delay).unwrap_or(i32::MAX)
    }

    /// Arena size used for movement bounds
    pub fn bounds(&self) -> Vec2 {
        Vec2::new(ARENA_WIDTH, ARENA_HEIGHT)
    }

    pub fn player(&self, id: EntityId) -> Option<&Player> {
        self.registry.get(id).and_then(Entity::as_player)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut Player> {
        self.registry.get_mut(id).and_then(Entity::as_player_mut)
    }

    /// Tank for a player number (1-based)
    pub fn player_by_number(&self, number: u8) -> Option<&Player> {
        self.players
            .iter()
            .filter_map(|id| self.player(*id))
            .find(|p| p.number == number)
    }

    pub fn player_id_by_number(&self, number: u8) -> Option<EntityId> {
        self.players
            .iter()
            .copied()
            .find(|id| self.player(*id).is_some_and(|p| p.number == number))
    }

    /// Participating players still in the match
    pub fn players_alive(&self) -> usize {
        self.players
            .iter()
            .filter_map(|id| self.player(*id))
            .filter(|p| !p.is_dead())
            .count()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Register a bullet fired by `owner`
    pub fn spawn_bullet(&mut self, owner: EntityId, launch: BulletLaunch) -> EntityId {
        self.registry
            .spawn_with(|id| Entity::Bullet(Bullet::new(id, owner, launch)))
    }

    pub fn spawn_explosion(&mut self, pos: Vec2) -> EntityId {
        self.emit(GameEvent::ExplosionSpawned { pos });
        self.registry
            .spawn_with(|_| Entity::Explosion(Explosion::new(pos)))
    }

    pub fn spawn_powerup(&mut self, pos: Vec2, kind: PowerupKind) -> EntityId {
        log::debug!("Powerup {kind:?} spawned at ({:.0}, {:.0})", pos.x, pos.y);
        self.emit(GameEvent::PowerupSpawned { kind, pos });
        self.registry
            .spawn_with(|id| Entity::Powerup(Powerup::new(id, pos, kind)))
    }

    pub fn spawn_container(&mut self, pos: Vec2, contents: PowerupKind) -> EntityId {
        log::debug!("Container spawned at ({:.0}, {:.0})", pos.x, pos.y);
        self.emit(GameEvent::ContainerSpawned { pos });
        self.registry
            .spawn_with(|id| Entity::Container(Container::new(id, pos, contents)))
    }

    /// Count down the container timer and, once it has run out, make one
    /// placement attempt. A failed attempt retries next frame.
    pub fn update_container_spawn(&mut self, elapsed_ms: u32) -> Option<EntityId> {
        if self.container_spawn_ms > 0 {
            self.container_spawn_ms -= elapsed_ms as i32;
        }
        if self.container_spawn_ms > 0
            || self.registry.count_alive(EntityKind::Container) >= self.settings.max_containers
        {
            return None;
        }

        let col = self.rng.random_range(1..=(MAP_COLS - 2));
        let row = self.rng.random_range(1..=(MAP_ROWS - 2));
        // A 16px crate centered on a tile corner covers four tiles
        let pos = Vec2::new(col as f32, row as f32) * TILE_SIZE;
        if !self.container_site_clear(row, col, pos) {
            return None;
        }

        let contents = PowerupKind::random(&mut self.rng);
        let id = self.spawn_container(pos, contents);
        self.container_spawn_ms += Self::roll_spawn_delay(&self.settings, &mut self.rng);
        Some(id)
    }

    fn container_site_clear(&self, row: usize, col: usize, pos: Vec2) -> bool {
        let tiles_empty = self.map.is_empty_tile(row, col)
            && self.map.is_empty_tile(row - 1, col)
            && self.map.is_empty_tile(row, col - 1)
            && self.map.is_empty_tile(row - 1, col - 1);
        if !tiles_empty {
            return false;
        }

        let near = |other: Vec2| {
            (pos.x - other.x).abs() <= CONTAINER_SIZE && (pos.y - other.y).abs() <= CONTAINER_SIZE
        };
        [EntityKind::Container, EntityKind::Player, EntityKind::Block]
            .iter()
            .flat_map(|kind| self.registry.ids(*kind))
            .filter_map(|id| self.registry.get(*id))
            .filter(|entity| !entity.is_dead())
            .all(|entity| !near(entity.position()))
    }

    /// Final standings, in player-number order
    pub fn scoreboard(&self) -> Vec<ScoreLine> {
        self.players
            .iter()
            .filter_map(|id| self.player(*id))
            .map(|p| ScoreLine {
                player: p.number,
                score: p.score,
                lives: p.lives,
                eliminated: p.is_dead(),
                winner: self.winners.contains(&p.number),
            })
            .collect()
    }

    /// Check the win condition for the current mode. Returns the winners once met.
    pub fn evaluate_winners(&self) -> Option<Vec<u8>> {
        let players: Vec<&Player> = self.players.iter().filter_map(|id| self.player(*id)).collect();
        match self.settings.mode {
            MatchMode::Time => {
                if self.remaining_ms > 0 {
                    return None;
                }
                let best = players.iter().map(|p| p.score).max()?;
                Some(players.iter().filter(|p| p.score == best).map(|p| p.number).collect())
            }
            MatchMode::Score => {
                let winners: Vec<u8> = players
                    .iter()
                    .filter(|p| p.score >= self.settings.score_target)
                    .map(|p| p.number)
                    .collect();
                (!winners.is_empty()).then_some(winners)
            }
            MatchMode::Stock => {
                let alive: Vec<u8> = players
                    .iter()
                    .filter(|p| !p.is_dead())
                    .map(|p| p.number)
                    .collect();
                // A solo match only ends when its single tank is gone
                let needed = players.len().min(2);
                (alive.len() < needed).then_some(alive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: MatchMode) -> MatchSettings {
        MatchSettings {
            seed: 7,
            ..MatchSettings::for_mode(mode)
        }
    }

    #[test]
    fn test_new_registers_participants() {
        let mut s = settings(MatchMode::Stock);
        s.players_in = [true, false, true, false];
        let state = MatchState::new(s, TileMap::open_arena());

        assert_eq!(state.players.len(), 2);
        assert_eq!(state.player_by_number(1).unwrap().lives, 3);
        assert!(state.player_by_number(2).is_none());
        assert_eq!(
            state.player_by_number(3).unwrap().position(),
            state.map.start_position(3)
        );
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.remaining_ms, 120_000);
    }

    #[test]
    fn test_map_blocks_are_registered() {
        let map = TileMap::from_ascii(&["", ".dD.d"]).unwrap();
        let state = MatchState::new(settings(MatchMode::Time), map);
        assert_eq!(state.registry.count_alive(EntityKind::Block), 3);
    }

    #[test]
    fn test_same_seed_same_setup() {
        let map = TileMap::from_ascii(&["", ".dddddddddddddddddddddd"]).unwrap();
        let a = MatchState::new(settings(MatchMode::Time), map.clone());
        let b = MatchState::new(settings(MatchMode::Time), map);
        assert_eq!(a.container_spawn_ms, b.container_spawn_ms);
        let contents = |s: &MatchState| -> Vec<Option<PowerupKind>> {
            s.registry
                .ids(EntityKind::Block)
                .iter()
                .filter_map(|id| s.registry.get(*id).and_then(Entity::as_block))
                .map(|b| b.contents)
                .collect()
        };
        assert_eq!(contents(&a), contents(&b));
    }

    #[test]
    fn test_container_spawns_after_timer() {
        let mut state = MatchState::new(settings(MatchMode::Time), TileMap::open_arena());
        state.container_spawn_ms = 10;
        assert!(state.update_container_spawn(5).is_none());

        // Open arena: most sites are clear, keep trying until one lands
        let mut spawned = None;
        for _ in 0..100 {
            spawned = state.update_container_spawn(5);
            if spawned.is_some() {
                break;
            }
        }
        let id = spawned.expect("container placed");
        assert!(state.registry.get(id).and_then(Entity::as_container).is_some());
        assert!(state.container_spawn_ms >= 5000 - 10);
        assert!(
            state
                .events
                .iter()
                .any(|e| matches!(e, GameEvent::ContainerSpawned { .. }))
        );
    }

    #[test]
    fn test_long_spawn_delay_never_goes_negative() {
        let settings = MatchSettings::from_json(
            r#"{ "container_spawn_min_ms": 3000000000, "container_spawn_max_ms": 3000000000 }"#,
        )
        .unwrap();
        let mut state = MatchState::new(settings, TileMap::open_arena());
        assert_eq!(state.container_spawn_ms, i32::MAX);

        for _ in 0..200 {
            assert!(state.update_container_spawn(16).is_none());
        }
        assert_eq!(state.registry.count_alive(EntityKind::Container), 0);
    }

    #[test]
    fn test_container_cap() {
        let mut state = MatchState::new(settings(MatchMode::Time), TileMap::open_arena());
        for i in 0..state.settings.max_containers {
            state.spawn_container(Vec2::new(40.0 + 20.0 * i as f32, 120.0), PowerupKind::Speed);
        }
        state.container_spawn_ms = 0;
        for _ in 0..50 {
            assert!(state.update_container_spawn(16).is_none());
        }
    }

    #[test]
    fn test_container_site_rejects_walls_and_neighbours() {
        let mut rows = vec![""; 10];
        rows.push("..........#");
        let map = TileMap::from_ascii(&rows).unwrap();
        let state = MatchState::new(settings(MatchMode::Time), map);
        // Wall at row 10 col 10 is one of the four covered tiles
        assert!(!state.container_site_clear(11, 11, Vec2::new(88.0, 88.0)));
        assert!(!state.container_site_clear(10, 10, Vec2::new(80.0, 80.0)));
        // Too close to player 1's fallback start
        let p1 = state.map.start_position(1);
        let (row, col) = ((p1.y / TILE_SIZE) as usize, (p1.x / TILE_SIZE) as usize);
        assert!(!state.container_site_clear(row, col, p1));
        assert!(state.container_site_clear(15, 20, Vec2::new(160.0, 120.0)));
    }

    #[test]
    fn test_evaluate_winners_per_mode() {
        let mut state = MatchState::new(settings(MatchMode::Time), TileMap::open_arena());
        assert!(state.evaluate_winners().is_none());
        let p2 = state.player_id_by_number(2).unwrap();
        let p4 = state.player_id_by_number(4).unwrap();
        state.player_mut(p2).unwrap().add_score(2);
        state.player_mut(p4).unwrap().add_score(2);
        state.remaining_ms = 0;
        assert_eq!(state.evaluate_winners(), Some(vec![2, 4]));

        state.settings.mode = MatchMode::Score;
        state.settings.score_target = 3;
        assert!(state.evaluate_winners().is_none());
        state.player_mut(p4).unwrap().add_score(1);
        assert_eq!(state.evaluate_winners(), Some(vec![4]));

        state.settings.mode = MatchMode::Stock;
        assert!(state.evaluate_winners().is_none());
        for number in [1, 2, 3] {
            let id = state.player_id_by_number(number).unwrap();
            state.player_mut(id).unwrap().die();
        }
        assert_eq!(state.evaluate_winners(), Some(vec![4]));
    }

    #[test]
    fn test_solo_stock_match_runs_until_death() {
        let mut s = settings(MatchMode::Stock);
        s.players_in = [true, false, false, false];
        let mut state = MatchState::new(s, TileMap::open_arena());
        assert!(state.evaluate_winners().is_none());
        let p1 = state.players[0];
        state.player_mut(p1).unwrap().die();
        assert_eq!(state.evaluate_winners(), Some(vec![]));
    }

    #[test]
    fn test_scoreboard() {
        let mut state = MatchState::new(settings(MatchMode::Score), TileMap::open_arena());
        state.winners = vec![3];
        let board = state.scoreboard();
        assert_eq!(board.len(), 4);
        assert!(board[2].winner);
        assert!(!board[0].winner);
        assert!(serde_json::to_string(&board).unwrap().contains("\"player\":3"));
    }
}
