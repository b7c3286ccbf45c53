//! Applies server patch batches to the world store.
//!
//! The server emits long horizontal runs of cells with the coordinates
//! elided: a missing `x` means "previous x + 1", a missing `y` means
//! "previous y". The run cursor survives across batches (an empty batch
//! changes nothing) and resets only when the world is cleared.

use delve_core::constants::{CellBg, CellFg};
use delve_core::types::patch::{CellPatch, MonsterPatch, TerrainPatch};

use crate::map::{CellView, WorldStore};

#[derive(Debug)]
pub struct PatchProcessor {
    last_x: i32,
    last_y: i32,
}

impl Default for PatchProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchProcessor {
    pub fn new() -> Self {
        // A fully elided first entry lands on (0, 0).
        Self {
            last_x: -1,
            last_y: 0,
        }
    }

    /// Resets the run cursor. Called on world clear.
    pub fn reset(&mut self) {
        self.last_x = -1;
        self.last_y = 0;
    }

    /// Applies one batch in order. A malformed entry is skipped with a
    /// warning; one bad cell must not stall the whole sync. After the
    /// batch, monsters that left all their cells are swept from the cache.
    pub fn apply_batch(&mut self, store: &mut WorldStore, batch: &[CellPatch]) {
        for patch in batch {
            let x = patch.x.unwrap_or(self.last_x + 1);
            let y = patch.y.unwrap_or(self.last_y);
            self.last_x = x;
            self.last_y = y;

            if let Err(err) = merge_cell(store, x, y, patch) {
                log::warn!("skipping malformed patch for ({x}, {y}): {err}");
                continue;
            }

            store.touch(x, y);
            store.extend_bounds(x, y);
        }

        store.sweep_monsters();
    }
}

fn merge_cell(store: &mut WorldStore, x: i32, y: i32, patch: &CellPatch) -> Result<(), String> {
    // Monster first: it is the only key that can fail validation, and a
    // rejected entry should leave the cell untouched.
    if let Some(mon) = &patch.mon {
        merge_monster(store, x, y, mon.as_ref())?;
    }

    let cell = store.get_mut(x, y);

    if let Some(t) = &patch.t {
        merge_terrain(cell.t.get_or_insert_with(CellView::default), t);
    }
    if let Some(mf) = patch.mf {
        cell.mf = mf;
    }
    if let Some(flash) = patch.flash {
        cell.flash = Some(flash);
    }
    for (key, value) in &patch.extra {
        cell.extra.insert(key.clone(), value.clone());
    }

    Ok(())
}

/// Attaches, replaces or detaches the cell's monster reference.
///
/// The first patch in a batch that mentions an id creates the cache
/// entry; later mentions shallow-merge their fields into it. A cell's
/// reference only counts once: re-mentioning the same monster on the same
/// cell leaves `refs` alone.
fn merge_monster(
    store: &mut WorldStore,
    x: i32,
    y: i32,
    payload: Option<&MonsterPatch>,
) -> Result<(), String> {
    let Some(payload) = payload else {
        // Explicit null: the monster left this cell.
        if let Some(old) = store.get_mut(x, y).mon.take() {
            store.release_monster(old);
        }
        return Ok(());
    };

    let id = payload
        .id
        .ok_or_else(|| "monster payload without id".to_string())?;

    let entry = store.monster_entry(id);
    if let Some(name) = &payload.name {
        entry.name = name.clone();
    }
    if let Some(typ) = payload.typ {
        entry.typ = typ;
    }
    if let Some(attitude) = payload.attitude {
        entry.attitude = attitude;
    }
    if let Some(threat) = payload.threat {
        entry.threat = threat;
    }
    if let Some(clientid) = payload.clientid {
        entry.clientid = Some(clientid);
    }

    let prev = store.get_mut(x, y).mon;
    if prev != Some(id) {
        store.get_mut(x, y).mon = Some(id);
        if let Some(old) = prev {
            store.release_monster(old);
        }
        store.monster_entry(id).refs += 1;
    }

    Ok(())
}

/// Shallow-merges present terrain fields into the cell's view.
fn merge_terrain(view: &mut CellView, t: &TerrainPatch) {
    if let Some(raw) = t.fg {
        view.fg = CellFg::from_raw(raw);
    }
    if let Some(raw) = t.bg {
        view.bg = CellBg::from_raw(raw);
    }
    if let Some(base) = t.base {
        view.base = base;
    }
    if let Some(flv) = &t.flv {
        if let Some(f) = flv.f {
            view.flv.f = f;
        }
        if let Some(s) = flv.s {
            view.flv.s = s;
        }
    }
    if let Some(doll) = &t.doll {
        view.doll = Some(doll.clone());
    }
    if let Some(mcache) = &t.mcache {
        view.mcache = Some(mcache.clone());
    }
    if let Some(ov) = &t.ov {
        view.ov = Some(ov.clone());
    }
    match t.trans {
        Some(trans) => view.trans = trans,
        // An equipment change invalidates any previously computed water
        // transparency.
        None if t.doll.is_some() => view.trans = false,
        None => {}
    }
    if let Some(bloody) = t.bloody {
        view.bloody = bloody;
    }
    if let Some(moldy) = t.moldy {
        view.moldy = moldy;
    }
    if let Some(liquefied) = t.liquefied {
        view.liquefied = liquefied;
    }
    if let Some(mangrove_water) = t.mangrove_water {
        view.mangrove_water = mangrove_water;
    }
    if let Some(sanctuary) = t.sanctuary {
        view.sanctuary = sanctuary;
    }
    if let Some(silenced) = t.silenced {
        view.silenced = silenced;
    }
    if let Some(halo) = t.halo {
        view.halo = halo;
    }
    if let Some(mark) = &t.mark {
        view.mark = Some(mark.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::types::patch::{DollPart, FlavourPatch};

    fn patch_at(x: i32, y: i32) -> CellPatch {
        CellPatch {
            x: Some(x),
            y: Some(y),
            t: Some(TerrainPatch {
                bg: Some(7),
                ..TerrainPatch::default()
            }),
            ..CellPatch::default()
        }
    }

    fn terrain_patch(t: TerrainPatch) -> CellPatch {
        CellPatch {
            t: Some(t),
            ..CellPatch::default()
        }
    }

    fn mon_patch(id: u64) -> CellPatch {
        CellPatch {
            mon: Some(Some(MonsterPatch {
                id: Some(id),
                ..MonsterPatch::default()
            })),
            ..CellPatch::default()
        }
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();
        proc.apply_batch(&mut store, &[patch_at(5, 10)]);
        store.reset_dirty();

        proc.apply_batch(&mut store, &[]);

        assert_eq!(store.len(), 1);
        assert!(store.dirty().is_empty());
        assert!(!store.reset_bounds_changed());
    }

    #[test]
    fn elided_coordinates_continue_the_run() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut first = patch_at(5, 10);
        first.t = Some(TerrainPatch {
            bg: Some(1),
            ..TerrainPatch::default()
        });
        let batch = vec![
            first,
            terrain_patch(TerrainPatch {
                bg: Some(2),
                ..TerrainPatch::default()
            }),
            terrain_patch(TerrainPatch {
                bg: Some(3),
                ..TerrainPatch::default()
            }),
        ];
        proc.apply_batch(&mut store, &batch);

        assert_eq!(store.dirty(), &[(5, 10), (6, 10), (7, 10)]);
        assert_eq!(store.peek(7, 10).unwrap().t.as_ref().unwrap().bg.tile, 3);
    }

    #[test]
    fn run_cursor_survives_across_batches() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        proc.apply_batch(&mut store, &[patch_at(5, 10)]);
        proc.apply_batch(&mut store, &[]);
        proc.apply_batch(
            &mut store,
            &[terrain_patch(TerrainPatch {
                bg: Some(9),
                ..TerrainPatch::default()
            })],
        );

        assert!(store.peek(6, 10).is_some());
    }

    #[test]
    fn run_cursor_resets_on_clear() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        proc.apply_batch(&mut store, &[patch_at(5, 10)]);
        store.clear();
        proc.reset();

        proc.apply_batch(
            &mut store,
            &[terrain_patch(TerrainPatch {
                bg: Some(9),
                ..TerrainPatch::default()
            })],
        );
        assert!(store.peek(0, 0).is_some());
    }

    #[test]
    fn two_row_batches_with_elision_cover_the_square() {
        // Two batches of two entries each, the second entry of each batch
        // fully elided.
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        proc.apply_batch(
            &mut store,
            &[
                patch_at(2, 2),
                terrain_patch(TerrainPatch {
                    bg: Some(7),
                    ..TerrainPatch::default()
                }),
            ],
        );
        proc.apply_batch(
            &mut store,
            &[
                patch_at(2, 3),
                terrain_patch(TerrainPatch {
                    bg: Some(7),
                    ..TerrainPatch::default()
                }),
            ],
        );

        let mut occupied: Vec<(i32, i32)> = store.dirty().to_vec();
        occupied.sort_unstable();
        assert_eq!(occupied, vec![(2, 2), (2, 3), (3, 2), (3, 3)]);
    }

    #[test]
    fn monster_attach_and_detach_round_trip() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut attach = mon_patch(7);
        attach.x = Some(0);
        attach.y = Some(0);
        if let Some(Some(mon)) = attach.mon.as_mut() {
            mon.typ = Some(3);
        }
        proc.apply_batch(&mut store, &[attach]);

        let entry = store.monster(7).unwrap();
        assert_eq!(entry.refs, 1);
        assert_eq!(entry.typ, 3);
        assert_eq!(entry.attitude, 0);

        let detach = CellPatch {
            x: Some(0),
            y: Some(0),
            mon: Some(None),
            ..CellPatch::default()
        };
        proc.apply_batch(&mut store, &[detach]);

        assert!(store.monster(7).is_none());
        assert_eq!(store.peek(0, 0).unwrap().mon, None);
    }

    #[test]
    fn moving_monster_keeps_one_live_reference() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut attach = mon_patch(7);
        attach.x = Some(0);
        attach.y = Some(0);
        proc.apply_batch(&mut store, &[attach]);

        // The monster steps east: the old cell clears, the new one
        // attaches, all within one batch.
        let clear = CellPatch {
            x: Some(0),
            y: Some(0),
            mon: Some(None),
            ..CellPatch::default()
        };
        let mut attach = mon_patch(7);
        attach.x = Some(1);
        attach.y = Some(0);
        proc.apply_batch(&mut store, &[clear, attach]);

        assert_eq!(store.monster(7).unwrap().refs, 1);
        assert_eq!(store.peek(1, 0).unwrap().mon, Some(7));
        assert_eq!(store.peek(0, 0).unwrap().mon, None);
    }

    #[test]
    fn later_mentions_merge_into_the_first_entry() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let first = CellPatch {
            x: Some(0),
            y: Some(0),
            mon: Some(Some(MonsterPatch {
                id: Some(9),
                name: Some("ogre".to_string()),
                ..MonsterPatch::default()
            })),
            ..CellPatch::default()
        };
        let second = CellPatch {
            x: Some(1),
            y: Some(0),
            mon: Some(Some(MonsterPatch {
                id: Some(9),
                threat: Some(2),
                ..MonsterPatch::default()
            })),
            ..CellPatch::default()
        };
        proc.apply_batch(&mut store, &[first, second]);

        let entry = store.monster(9).unwrap();
        assert_eq!(entry.name, "ogre");
        assert_eq!(entry.threat, 2);
        // Two distinct cells reference the entry.
        assert_eq!(entry.refs, 2);
    }

    #[test]
    fn re_mentioning_a_cell_does_not_double_count() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut attach = mon_patch(5);
        attach.x = Some(3);
        attach.y = Some(3);
        proc.apply_batch(&mut store, &[attach.clone()]);
        proc.apply_batch(&mut store, &[attach]);

        assert_eq!(store.monster(5).unwrap().refs, 1);
    }

    #[test]
    fn refcount_invariant_holds_after_each_sweep() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut a = mon_patch(1);
        a.x = Some(0);
        a.y = Some(0);
        let mut b = mon_patch(2);
        b.x = Some(1);
        b.y = Some(0);
        proc.apply_batch(&mut store, &[a, b]);

        // Replace monster 1 with monster 2 on (0, 0); 1 loses its last
        // reference and must be swept.
        let mut replace = mon_patch(2);
        replace.x = Some(0);
        replace.y = Some(0);
        proc.apply_batch(&mut store, &[replace]);

        assert!(store.monster(1).is_none());
        assert_eq!(store.monster(2).unwrap().refs, 2);
        assert_eq!(store.monster_count(), 1);
    }

    #[test]
    fn malformed_monster_payload_is_skipped() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let bad = CellPatch {
            x: Some(0),
            y: Some(0),
            mon: Some(Some(MonsterPatch::default())),
            ..CellPatch::default()
        };
        let good = patch_at(1, 0);
        proc.apply_batch(&mut store, &[bad, good]);

        // The bad entry neither dirtied nor materialized its cell, and the
        // rest of the batch still applied.
        assert_eq!(store.dirty(), &[(1, 0)]);
        assert!(store.peek(1, 0).is_some());
    }

    #[test]
    fn doll_without_trans_forces_trans_false() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut with_trans = patch_at(0, 0);
        with_trans.t = Some(TerrainPatch {
            trans: Some(true),
            ..TerrainPatch::default()
        });
        proc.apply_batch(&mut store, &[with_trans]);
        assert!(store.peek(0, 0).unwrap().t.as_ref().unwrap().trans);

        let mut dolled = patch_at(0, 0);
        dolled.t = Some(TerrainPatch {
            doll: Some(vec![DollPart(0x8000, 32)]),
            ..TerrainPatch::default()
        });
        proc.apply_batch(&mut store, &[dolled]);
        assert!(!store.peek(0, 0).unwrap().t.as_ref().unwrap().trans);
    }

    #[test]
    fn terrain_merge_is_shallow_per_field() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut first = patch_at(0, 0);
        first.t = Some(TerrainPatch {
            bg: Some(7),
            flv: Some(FlavourPatch {
                f: Some(4),
                s: Some(9),
            }),
            ..TerrainPatch::default()
        });
        proc.apply_batch(&mut store, &[first]);

        let mut second = patch_at(0, 0);
        second.t = Some(TerrainPatch {
            flv: Some(FlavourPatch {
                f: Some(5),
                s: None,
            }),
            ..TerrainPatch::default()
        });
        proc.apply_batch(&mut store, &[second]);

        let view = store.peek(0, 0).unwrap().t.as_ref().unwrap().clone();
        assert_eq!(view.bg.tile, 7);
        assert_eq!(view.flv.f, 5);
        assert_eq!(view.flv.s, 9);
    }

    #[test]
    fn bounds_track_every_merged_coordinate() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        proc.apply_batch(&mut store, &[patch_at(5, 10)]);
        assert!(store.reset_bounds_changed());

        proc.apply_batch(&mut store, &[patch_at(-3, 2), patch_at(8, 20)]);
        let bounds = *store.bounds().unwrap();
        assert_eq!(
            (bounds.left, bounds.top, bounds.right, bounds.bottom),
            (-3, 2, 8, 20)
        );
        assert!(store.reset_bounds_changed());

        // Interior merges do not flag a change.
        proc.apply_batch(&mut store, &[patch_at(0, 5)]);
        assert!(!store.reset_bounds_changed());
    }

    #[test]
    fn unknown_keys_overwrite_directly() {
        let mut store = WorldStore::new();
        let mut proc = PatchProcessor::new();

        let mut patch = patch_at(0, 0);
        patch
            .extra
            .insert("g".to_string(), serde_json::Value::from("@"));
        proc.apply_batch(&mut store, &[patch]);

        let mut patch = patch_at(0, 0);
        patch
            .extra
            .insert("g".to_string(), serde_json::Value::from("x"));
        proc.apply_batch(&mut store, &[patch]);

        assert_eq!(
            store.peek(0, 0).unwrap().extra.get("g"),
            Some(&serde_json::Value::from("x"))
        );
    }
}
