//! Arena tile layout and static colliders
//!
//! A map is a 30x40 grid of 8px tiles. The border is always solid and is
//! covered by four long colliders; every other solid tile gets its own 8x8
//! collider whose flags depend on the tile class. Destructible blocks and
//! player start markers are pulled out of the grid and exposed separately.
//!
//! Binary layout: `DE AD BE EF` followed by 1200 tile bytes, row-major.

use std::fmt;
use std::path::Path;

use glam::Vec2;
use serde::Serialize;

use crate::consts::*;
use crate::sim::collision::Collider;

/// Leading magic of the binary map format
pub const MAP_MAGIC: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Tile codes
pub mod tile {
    pub const EMPTY: u8 = 0x00;
    /// Default solid wall code (range 0x01..=0x1F)
    pub const WALL: u8 = 0x01;
    /// Default water code (range 0x20..=0x2F)
    pub const WATER: u8 = 0x20;
    /// Default decoration code (range 0x30..=0x3F)
    pub const DECORATION: u8 = 0x30;
    pub const BRITTLE_BLOCK: u8 = 0x80;
    pub const P1_START: u8 = 0x81;
    pub const P4_START: u8 = 0x84;
    pub const STURDY_BLOCK: u8 = 0x85;
}

/// How a tile behaves for tanks and shells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileClass {
    Empty,
    /// Blocks tanks and shots
    Wall,
    /// Blocks tanks, shots fly over
    Water,
    /// Purely visual
    Decoration,
}

impl TileClass {
    pub fn of(code: u8) -> Self {
        match code {
            0x01..=0x1F => TileClass::Wall,
            0x20..=0x2F => TileClass::Water,
            0x30..=0x3F => TileClass::Decoration,
            _ => TileClass::Empty,
        }
    }

    /// (passable, stops_shots) for this tile's collider, or `None` if it has none
    fn collider_flags(self) -> Option<(bool, bool)> {
        match self {
            TileClass::Empty => None,
            TileClass::Wall => Some((false, true)),
            TileClass::Water => Some((false, false)),
            TileClass::Decoration => Some((true, false)),
        }
    }
}

/// A destructible block placed by the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockPlacement {
    pub pos: Vec2,
    pub hp: u32,
    pub deflects: bool,
}

/// Error type for map loading
#[derive(Debug)]
pub enum MapError {
    /// File does not start with `DE AD BE EF`
    BadMagic,
    /// Not enough bytes for the full grid
    Truncated { expected: usize, found: usize },
    /// ASCII map taller than the grid
    TooManyRows,
    /// ASCII row wider than the grid
    RowTooLong { row: usize },
    /// ASCII character with no tile meaning
    UnknownGlyph { row: usize, col: usize, glyph: char },
    /// Map file could not be read
    Io(std::io::Error),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::BadMagic => write!(f, "not a map file (bad magic)"),
            MapError::Truncated { expected, found } => {
                write!(f, "map truncated: expected {expected} bytes, found {found}")
            }
            MapError::TooManyRows => write!(f, "map has more than {MAP_ROWS} rows"),
            MapError::RowTooLong { row } => {
                write!(f, "map row {row} is wider than {MAP_COLS} tiles")
            }
            MapError::UnknownGlyph { row, col, glyph } => {
                write!(f, "unknown map glyph {glyph:?} at row {row}, col {col}")
            }
            MapError::Io(e) => write!(f, "failed to read map: {e}"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MapError {
    fn from(e: std::io::Error) -> Self {
        MapError::Io(e)
    }
}

/// Loaded arena layout
#[derive(Debug, Clone, Serialize)]
pub struct TileMap {
    /// Row-major tile codes
    tiles: Vec<u8>,
    start_positions: [Option<Vec2>; MAX_PLAYERS],
    colliders: Vec<Collider>,
    blocks: Vec<BlockPlacement>,
}

impl Default for TileMap {
    fn default() -> Self {
        Self::open_arena()
    }
}

impl TileMap {
    /// Empty arena with only the border walls
    pub fn open_arena() -> Self {
        Self::from_grid(vec![tile::EMPTY; MAP_ROWS * MAP_COLS])
    }

    /// Parse the binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MapError> {
        let expected = MAP_MAGIC.len() + MAP_ROWS * MAP_COLS;
        if bytes.len() < MAP_MAGIC.len() {
            return Err(MapError::Truncated {
                expected,
                found: bytes.len(),
            });
        }
        if bytes[..MAP_MAGIC.len()] != MAP_MAGIC {
            return Err(MapError::BadMagic);
        }
        if bytes.len() < expected {
            return Err(MapError::Truncated {
                expected,
                found: bytes.len(),
            });
        }

        Ok(Self::from_grid(bytes[MAP_MAGIC.len()..expected].to_vec()))
    }

    /// Parse an ASCII layout. Missing rows and columns are empty.
    ///
    /// `.` empty, `#` wall, `~` water, `"` decoration, `d` brittle block,
    /// `D` sturdy block, `1`-`4` player starts.
    pub fn from_ascii(rows: &[&str]) -> Result<Self, MapError> {
        if rows.len() > MAP_ROWS {
            return Err(MapError::TooManyRows);
        }
        let mut grid = vec![tile::EMPTY; MAP_ROWS * MAP_COLS];
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() > MAP_COLS {
                return Err(MapError::RowTooLong { row });
            }
            for (col, glyph) in line.chars().enumerate() {
                grid[row * MAP_COLS + col] = match glyph {
                    '.' | ' ' => tile::EMPTY,
                    '#' => tile::WALL,
                    '~' => tile::WATER,
                    '"' => tile::DECORATION,
                    'd' => tile::BRITTLE_BLOCK,
                    'D' => tile::STURDY_BLOCK,
                    '1'..='4' => tile::P1_START + (glyph as u8 - b'1'),
                    _ => return Err(MapError::UnknownGlyph { row, col, glyph }),
                };
            }
        }
        Ok(Self::from_grid(grid))
    }

    /// Read a binary map file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let bytes = std::fs::read(path.as_ref())?;
        let map = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded map {} ({} colliders, {} blocks)",
            path.as_ref().display(),
            map.colliders.len(),
            map.blocks.len()
        );
        Ok(map)
    }

    fn from_grid(mut tiles: Vec<u8>) -> Self {
        let mut start_positions = [None; MAX_PLAYERS];
        let mut blocks = Vec::new();
        let mut colliders = Self::border_colliders();

        for (row, cells) in tiles.chunks_exact_mut(MAP_COLS).enumerate() {
            for (col, code) in cells.iter_mut().enumerate() {
                if row == 0 || row == MAP_ROWS - 1 || col == 0 || col == MAP_COLS - 1 {
                    *code = tile::WALL;
                    continue;
                }
                let origin = Vec2::new(col as f32, row as f32) * TILE_SIZE;
                let center = origin + Vec2::splat(TILE_SIZE / 2.0);
                match *code {
                    tile::P1_START..=tile::P4_START => {
                        let slot = (*code - tile::P1_START) as usize;
                        // A 16px tank covers the marker tile and its right/lower neighbours
                        start_positions[slot] = Some(origin + Vec2::splat(PLAYER_SIZE / 2.0));
                        *code = tile::EMPTY;
                    }
                    tile::BRITTLE_BLOCK => {
                        blocks.push(BlockPlacement {
                            pos: center,
                            hp: BRITTLE_BLOCK_HP,
                            deflects: false,
                        });
                        *code = tile::EMPTY;
                    }
                    tile::STURDY_BLOCK => {
                        blocks.push(BlockPlacement {
                            pos: center,
                            hp: STURDY_BLOCK_HP,
                            deflects: true,
                        });
                        *code = tile::EMPTY;
                    }
                    other => {
                        let class = TileClass::of(other);
                        if class == TileClass::Empty {
                            *code = tile::EMPTY;
                        }
                        if let Some((passable, stops_shots)) = class.collider_flags() {
                            colliders.push(Collider::terrain(
                                center,
                                TILE_SIZE,
                                TILE_SIZE,
                                passable,
                                stops_shots,
                            ));
                        }
                    }
                }
            }
        }

        Self {
            tiles,
            start_positions,
            colliders,
            blocks,
        }
    }

    fn border_colliders() -> Vec<Collider> {
        let half = TILE_SIZE / 2.0;
        let side_height = ARENA_HEIGHT - 2.0 * TILE_SIZE;
        vec![
            Collider::terrain(Vec2::new(ARENA_WIDTH / 2.0, half), ARENA_WIDTH, TILE_SIZE, false, true),
            Collider::terrain(
                Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT - half),
                ARENA_WIDTH,
                TILE_SIZE,
                false,
                true,
            ),
            Collider::terrain(Vec2::new(half, ARENA_HEIGHT / 2.0), TILE_SIZE, side_height, false, true),
            Collider::terrain(
                Vec2::new(ARENA_WIDTH - half, ARENA_HEIGHT / 2.0),
                TILE_SIZE,
                side_height,
                false,
                true,
            ),
        ]
    }

    /// Tile code at a grid cell, `None` outside the grid
    pub fn tile_at(&self, row: usize, col: usize) -> Option<u8> {
        if row >= MAP_ROWS || col >= MAP_COLS {
            return None;
        }
        self.tiles.get(row * MAP_COLS + col).copied()
    }

    pub fn is_empty_tile(&self, row: usize, col: usize) -> bool {
        self.tile_at(row, col) == Some(tile::EMPTY)
    }

    /// Static colliders (border first, then interior tiles in row-major order)
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn blocks(&self) -> &[BlockPlacement] {
        &self.blocks
    }

    /// Start position for player `number` (1-based). Falls back to a corner
    /// when the map has no marker for that player.
    pub fn start_position(&self, number: u8) -> Vec2 {
        let slot = (number.clamp(1, MAX_PLAYERS as u8) - 1) as usize;
        self.start_positions[slot].unwrap_or_else(|| {
            let inset = TILE_SIZE + PLAYER_SIZE;
            let corners = [
                Vec2::new(inset, inset),
                Vec2::new(ARENA_WIDTH - inset, ARENA_HEIGHT - inset),
                Vec2::new(ARENA_WIDTH - inset, inset),
                Vec2::new(inset, ARENA_HEIGHT - inset),
            ];
            corners[slot]
        })
    }

    /// Whether the map placed an explicit marker for player `number`
    pub fn has_start_marker(&self, number: u8) -> bool {
        (1..=MAX_PLAYERS as u8).contains(&number) && self.start_positions[(number - 1) as usize].is_some()
    }
}
