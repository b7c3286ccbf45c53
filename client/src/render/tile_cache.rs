//! Tile sheet images and per-tile draw metadata.
//!
//! The asset pipeline (outside this crate) decodes the sheets and
//! registers every tile id it ships. Rendering a tile id nobody
//! registered is an error the cell painter recovers from.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Decoded image, 0xAARRGGBB pixels.
#[derive(Debug, Clone)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl TileImage {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    /// Single-color opaque image.
    pub fn solid(width: u32, height: u32, color: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xFF00_0000 | color; (width * height) as usize],
        }
    }
}

/// Where a tile lives on its sheet and how it is anchored in a cell.
///
/// (sx, sy)-(ex, ey) is the source rectangle; (ox, oy) shifts the draw
/// position and may be negative, in which case the tile spills into the
/// cell above or to the left. `w`/`h` are the tile's logical dimensions
/// used for centering.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileInfo {
    pub sheet: usize,
    pub sx: u32,
    pub sy: u32,
    pub ex: u32,
    pub ey: u32,
    pub ox: i32,
    pub oy: i32,
    pub w: u32,
    pub h: u32,
}

/// How an animated tile family advances each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimKind {
    /// Step to the next variant.
    Cycle,
    /// Four-phase offset stepped by the global counter.
    LavaPhase,
    /// Re-roll a random variant.
    Random,
}

#[derive(Debug, Clone, Copy)]
struct Family {
    count: u32,
    anim: Option<AnimKind>,
}

#[derive(Debug, Default)]
pub struct TileCache {
    sheets: Vec<TileImage>,
    info: HashMap<u32, TileInfo>,
    families: HashMap<u32, Family>,
    base_of: HashMap<u32, u32>,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decoded sheet and returns its index for `TileInfo::sheet`.
    pub fn add_sheet(&mut self, img: TileImage) -> usize {
        self.sheets.push(img);
        self.sheets.len() - 1
    }

    pub fn register(&mut self, id: u32, info: TileInfo) {
        self.info.insert(id, info);
    }

    /// Declares `base .. base + count` a variant family, optionally
    /// animated. Every variant maps back to `base`.
    pub fn register_family(&mut self, base: u32, count: u32, anim: Option<AnimKind>) {
        self.families.insert(base, Family { count, anim });
        for variant in base..base + count {
            self.base_of.insert(variant, base);
        }
    }

    pub fn info(&self, id: u32) -> Result<&TileInfo> {
        self.info
            .get(&id)
            .ok_or_else(|| anyhow!("tile {id:#06x} has no image metadata"))
    }

    pub fn sheet(&self, index: usize) -> Option<&TileImage> {
        self.sheets.get(index)
    }

    /// First tile of the family `id` belongs to, or `id` itself.
    pub fn basetile(&self, id: u32) -> u32 {
        self.base_of.get(&id).copied().unwrap_or(id)
    }

    /// Variant count of the family starting at `base` (1 when unknown).
    pub fn tile_count(&self, base: u32) -> u32 {
        self.families.get(&base).map_or(1, |f| f.count.max(1))
    }

    pub fn anim_kind(&self, base: u32) -> Option<AnimKind> {
        self.families.get(&base).and_then(|f| f.anim)
    }
}
