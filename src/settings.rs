//! Match settings
//!
//! Loaded from JSON; every field is optional and falls back to its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_PLAYERS, MAX_STOCK, MIN_STOCK};

/// Longest container spawn delay the match timer can hold
const MAX_SPAWN_DELAY_MS: u32 = i32::MAX as u32;

/// Win condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MatchMode {
    /// Highest score when the clock runs out
    #[default]
    Time,
    /// First to the score target
    Score,
    /// Last tank standing
    Stock,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Time => "Time",
            MatchMode::Score => "Score",
            MatchMode::Stock => "Stock",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "time" => Some(MatchMode::Time),
            "score" => Some(MatchMode::Score),
            "stock" | "lives" => Some(MatchMode::Stock),
            _ => None,
        }
    }
}

/// Per-match configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub mode: MatchMode,
    /// Time mode: match length
    pub time_limit_secs: u32,
    /// Score mode: points needed to win
    pub score_target: i32,
    /// Stock mode: lives per player (clamped to 1..=9)
    pub stock: u32,
    /// Which player slots take part
    pub players_in: [bool; MAX_PLAYERS],
    /// RNG seed for container spawns and block contents
    pub seed: u64,

    // === Containers ===
    pub container_spawn_min_ms: u32,
    pub container_spawn_max_ms: u32,
    pub max_containers: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            mode: MatchMode::Time,
            time_limit_secs: 120,
            score_target: 10,
            stock: 3,
            players_in: [true; MAX_PLAYERS],
            seed: 0,

            container_spawn_min_ms: 5000,
            container_spawn_max_ms: 30_000,
            max_containers: 5,
        }
    }
}

impl MatchSettings {
    /// Defaults for a mode
    pub fn for_mode(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Invalid settings in {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Clamp out-of-range values
    pub fn normalized(mut self) -> Self {
        self.stock = self.effective_stock();
        // The spawn timer counts down in an i32
        self.container_spawn_min_ms = self.container_spawn_min_ms.min(MAX_SPAWN_DELAY_MS);
        self.container_spawn_max_ms = self.container_spawn_max_ms.min(MAX_SPAWN_DELAY_MS);
        if self.container_spawn_max_ms < self.container_spawn_min_ms {
            std::mem::swap(&mut self.container_spawn_min_ms, &mut self.container_spawn_max_ms);
        }
        self
    }

    /// Lives per player, within 1..=9
    pub fn effective_stock(&self) -> u32 {
        self.stock.clamp(MIN_STOCK, MAX_STOCK)
    }

    /// Match length in milliseconds
    pub fn time_limit_ms(&self) -> i64 {
        self.time_limit_secs as i64 * 1000
    }

    /// Number of participating player slots
    pub fn player_count(&self) -> usize {
        self.players_in.iter().filter(|p| **p).count()
    }
}
