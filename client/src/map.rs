//! Client-side world knowledge: a sparse grid of cells, the shared monster
//! cache, the dirty-coordinate list and the touched-area bounds.

use std::collections::HashMap;

use delve_core::constants::{BgFlags, CellBg, CellFg};
use delve_core::types::patch::{DollPart, Flash, McachePart};

pub type MonsterId = u64;

/// Floor variant selector (`f`) and special-overlay seed (`s`). The seed
/// picks blood/mold/liquefaction variants deterministically so repeated
/// paints of the same cell look identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flavour {
    pub f: u32,
    pub s: u32,
}

/// Merged terrain/appearance state of one cell.
#[derive(Debug, Clone, Default)]
pub struct CellView {
    pub fg: CellFg,
    pub bg: CellBg,
    /// Item-pile tile drawn under the occupant, 0 if none.
    pub base: u32,
    pub flv: Flavour,
    pub doll: Option<Vec<DollPart>>,
    pub mcache: Option<Vec<McachePart>>,
    pub ov: Option<Vec<u32>>,
    pub trans: bool,
    pub bloody: bool,
    pub moldy: bool,
    pub liquefied: bool,
    pub mangrove_water: bool,
    pub sanctuary: bool,
    pub silenced: bool,
    /// 0 = none, 1 = halo, 2 = umbra.
    pub halo: u8,
    pub mark: Option<String>,
    /// Topmost pixel row touched by the last paint, relative to the cell
    /// top. Negative when the paint spilled into the row above; the cell
    /// above consults this when it repaints.
    pub sy: i32,
    /// Leftmost pixel column touched by the last paint, relative to the
    /// cell left. Negative when the paint spilled into the cell to the
    /// left.
    pub left_overlap: i32,
}

/// One grid cell. Materialized lazily on first access.
#[derive(Debug, Clone, Default)]
pub struct MapCell {
    pub x: i32,
    pub y: i32,
    pub t: Option<CellView>,
    pub mon: Option<MonsterId>,
    /// Minimap feature code.
    pub mf: u8,
    pub flash: Option<Flash>,
    /// Forward-compatible fields carried verbatim from the wire.
    pub extra: HashMap<String, serde_json::Value>,
    pub(crate) dirty: bool,
}

/// A monster shared between every cell it currently occupies, alive while
/// at least one cell references it.
#[derive(Debug, Clone, Default)]
pub struct MonsterEntry {
    pub id: MonsterId,
    pub name: String,
    pub typ: i32,
    /// 0 = hostile.
    pub attitude: i32,
    /// Hp bucket.
    pub threat: i32,
    pub clientid: Option<u64>,
    pub refs: u32,
}

/// Smallest rectangle containing every touched coordinate. Edges only ever
/// move outward until the store is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    fn at(x: i32, y: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x,
            bottom: y,
        }
    }

    /// Grows to include (x, y); returns whether any edge moved.
    fn extend(&mut self, x: i32, y: i32) -> bool {
        let mut moved = false;
        if x < self.left {
            self.left = x;
            moved = true;
        }
        if x > self.right {
            self.right = x;
            moved = true;
        }
        if y < self.top {
            self.top = y;
            moved = true;
        }
        if y > self.bottom {
            self.bottom = y;
            moved = true;
        }
        moved
    }
}

#[inline]
fn cell_key(x: i32, y: i32) -> u64 {
    ((x as u32 as u64) << 32) | y as u32 as u64
}

#[derive(Debug, Default)]
pub struct WorldStore {
    cells: HashMap<u64, MapCell>,
    monsters: HashMap<MonsterId, MonsterEntry>,
    dirty: Vec<(i32, i32)>,
    bounds: Option<Bounds>,
    bounds_changed: bool,
    player_on_level: bool,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of materialized cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Never fails; materializes a blank cell on first access.
    pub fn get_mut(&mut self, x: i32, y: i32) -> &mut MapCell {
        self.cells.entry(cell_key(x, y)).or_insert_with(|| MapCell {
            x,
            y,
            ..MapCell::default()
        })
    }

    /// Read-only lookup that does not materialize.
    pub fn peek(&self, x: i32, y: i32) -> Option<&MapCell> {
        self.cells.get(&cell_key(x, y))
    }

    /// Marks a cell dirty. Idempotent: the coordinate is appended to the
    /// dirty list only on the cell's own 0 -> 1 dirty transition, so the
    /// list never needs a membership scan.
    pub fn touch(&mut self, x: i32, y: i32) {
        let cell = self.get_mut(x, y);
        if !cell.dirty {
            cell.dirty = true;
            self.dirty.push((x, y));
        }
    }

    /// A cell is visible iff it has terrain data and is neither
    /// remembered-unseen nor magic-mapped-unseen.
    pub fn visible(cell: &MapCell) -> bool {
        cell.t.as_ref().is_some_and(|t| {
            !t.bg
                .flags
                .intersects(BgFlags::UNSEEN | BgFlags::MM_UNSEEN)
        })
    }

    /// Discards all cells, the monster cache and the bounds. The dirty
    /// list is the caller's responsibility.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.monsters.clear();
        self.bounds = None;
        self.bounds_changed = false;
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// Grows the bounds to include (x, y), creating them on the very first
    /// touched cell.
    pub(crate) fn extend_bounds(&mut self, x: i32, y: i32) {
        match self.bounds.as_mut() {
            Some(bounds) => {
                if bounds.extend(x, y) {
                    self.bounds_changed = true;
                }
            }
            None => {
                self.bounds = Some(Bounds::at(x, y));
                self.bounds_changed = true;
            }
        }
    }

    /// Read-and-clear.
    pub fn reset_bounds_changed(&mut self) -> bool {
        std::mem::take(&mut self.bounds_changed)
    }

    /// Coordinates touched since the last drain, in touch order.
    pub fn dirty(&self) -> &[(i32, i32)] {
        &self.dirty
    }

    pub fn reset_dirty(&mut self) {
        for &(x, y) in &self.dirty {
            if let Some(cell) = self.cells.get_mut(&cell_key(x, y)) {
                cell.dirty = false;
            }
        }
        self.dirty.clear();
    }

    pub fn monster(&self, id: MonsterId) -> Option<&MonsterEntry> {
        self.monsters.get(&id)
    }

    /// Fetches or creates the cache entry for `id`. New entries carry the
    /// server defaults (hostile attitude) and zero refs until a cell
    /// attaches.
    pub(crate) fn monster_entry(&mut self, id: MonsterId) -> &mut MonsterEntry {
        self.monsters.entry(id).or_insert_with(|| MonsterEntry {
            id,
            ..MonsterEntry::default()
        })
    }

    /// Drops one reference from `id`.
    pub(crate) fn release_monster(&mut self, id: MonsterId) {
        if let Some(entry) = self.monsters.get_mut(&id) {
            entry.refs = entry.refs.saturating_sub(1);
        }
    }

    /// Deletes every entry no cell points at anymore. Runs after each
    /// patch batch.
    pub(crate) fn sweep_monsters(&mut self) {
        self.monsters.retain(|id, entry| {
            if entry.refs == 0 {
                log::trace!("monster {id} left the map");
                false
            } else {
                true
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    /// Resolves the monster referenced by the cell at (x, y). A reference
    /// to an entry missing from the cache should not happen under the
    /// refcount discipline; it is treated as "no monster" and the stale
    /// slot is dropped.
    pub fn resolve_monster(&mut self, x: i32, y: i32) -> Option<&MonsterEntry> {
        let cell = self.cells.get_mut(&cell_key(x, y))?;
        let id = cell.mon?;
        if !self.monsters.contains_key(&id) {
            log::warn!("cell ({x}, {y}) references unknown monster {id}, dropping");
            cell.mon = None;
            return None;
        }
        self.monsters.get(&id)
    }

    pub fn set_player_on_level(&mut self, on_level: bool) {
        self.player_on_level = on_level;
    }

    pub fn player_on_level(&self) -> bool {
        self.player_on_level
    }
}
