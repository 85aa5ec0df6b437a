//! Tank Arena headless runner
//!
//! Plays one seeded match with scripted bots and prints the final standings
//! as JSON.
//!
//! Usage: `tank-arena [MAP] [SETTINGS.json]`
//! MAP is a binary map file, or `.txt` ASCII art (one row per line).

use std::error::Error;
use std::path::Path;

use glam::Vec2;
use tank_arena::audio::LogAudio;
use tank_arena::sim::{FrameInput, MatchState, Player, PlayerControl, advance};
use tank_arena::{MatchSettings, TileMap, heading_to_degrees, wrap_degrees};

/// Simulated frame length
const FRAME_MS: u32 = 16;
/// Hard stop for matches that never end (score or stock with passive bots)
const MAX_MATCH_MS: u64 = 15 * 60 * 1000;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    log::info!("Tank Arena (headless) starting...");

    let mut args = std::env::args().skip(1);
    let map = match args.next() {
        Some(path) => load_map(Path::new(&path))?,
        None => TileMap::open_arena(),
    };
    let settings = match args.next() {
        Some(path) => MatchSettings::load(path),
        None => MatchSettings::default(),
    };

    let mut state = MatchState::new(settings, map);
    let mut audio = LogAudio::new();

    let mut frame: u64 = 0;
    while !state.is_finished() && state.elapsed_ms < MAX_MATCH_MS {
        let input = bot_input(&state, frame);
        advance(&mut state, &input, FRAME_MS, &mut audio);
        for event in &state.events {
            log::debug!("{event:?}");
        }
        frame += 1;
    }

    if !state.is_finished() {
        log::warn!("Match stopped after {}ms without a result", state.elapsed_ms);
    }
    log::info!("{} frames, {} sounds", frame, audio.played());

    println!("{}", serde_json::to_string_pretty(&state.scoreboard())?);
    Ok(())
}

fn load_map(path: &Path) -> Result<TileMap, Box<dyn Error>> {
    if path.extension().is_some_and(|ext| ext == "txt") {
        let text = std::fs::read_to_string(path)?;
        let rows: Vec<&str> = text.lines().collect();
        let map = TileMap::from_ascii(&rows)?;
        log::info!("Loaded ASCII map from {}", path.display());
        Ok(map)
    } else {
        Ok(TileMap::load(path)?)
    }
}

/// Every bot turns its turret toward the nearest rival and fires when lined up.
/// Bodies wander in a slow loop so the bots do not camp their start corner.
fn bot_input(state: &MatchState, frame: u64) -> FrameInput {
    let mut input = FrameInput::default();
    let tanks: Vec<&Player> = state
        .players
        .iter()
        .filter_map(|id| state.player(*id))
        .filter(|p| !p.is_dead())
        .collect();

    for bot in &tanks {
        let slot = (bot.number - 1) as usize;
        let Some(control) = input.controls.get_mut(slot) else {
            continue;
        };
        *control = wander(frame, slot);

        let target = tanks
            .iter()
            .filter(|other| other.number != bot.number)
            .map(|other| other.position())
            .min_by(|a, b| bot.position().distance(*a).total_cmp(&bot.position().distance(*b)));
        if let Some(target) = target {
            aim(control, bot, target, frame);
        }
    }
    input
}

fn wander(frame: u64, slot: usize) -> PlayerControl {
    let phase = (frame / 90 + slot as u64) % 4;
    PlayerControl {
        forward: if phase == 3 { -0.5 } else { 0.8 },
        rotation: match phase {
            0 => 0.5,
            2 => -0.5,
            _ => 0.0,
        },
        ..PlayerControl::default()
    }
}

fn aim(control: &mut PlayerControl, bot: &Player, target: Vec2, frame: u64) {
    let to_target = target - bot.position();
    if to_target.length_squared() < f32::EPSILON {
        return;
    }
    // Signed turret error in (-180, 180]
    let mut error = wrap_degrees(heading_to_degrees(to_target) - bot.turret_angle());
    if error > 180.0 {
        error -= 360.0;
    }
    // The turret also turns with the body, so cancel that out first
    control.turret = (error / 30.0 - control.rotation).clamp(-1.0, 1.0);
    // Release every other frame so the edge-triggered trigger can fire again
    control.fire = error.abs() < 10.0 && frame % 2 == 0;
}
