//! Per-cell compositing.
//!
//! A cell paint is a fixed stack of layers: background terrain and its
//! overlays, the occupant's doll/monster-overlay parts (split at the
//! water line when swimming), the foreground tile, status icons, meshes,
//! cursors, flash and debug mark. While painting, the lowest `sy` and
//! `left_overlap` reached by any tile are tracked; sprites taller or
//! wider than a cell push them negative, which is what later triggers the
//! neighbor repaint in the viewport.

use anyhow::{anyhow, Result};

use delve_core::constants::*;

use crate::map::{CellView, MapCell};
use crate::render::surface::{Surface, BLACK};
use crate::render::tile_cache::TileCache;
use crate::render::viewport::{CursorKind, RenderConfig, CURSOR_KINDS};

const MARK_COLOR: u32 = 0xFFFF_0000;

#[inline]
fn is_in_water(t: &CellView) -> bool {
    t.bg.flags.contains(BgFlags::WATER) && !t.fg.flags.contains(FgFlags::FLYING)
}

pub(crate) struct CellPainter<'a> {
    cfg: &'a RenderConfig,
    tiles: &'a TileCache,
    surface: &'a mut Surface,
    cursors: &'a [Option<(i32, i32)>; CURSOR_KINDS],
    cur_sy: i32,
    cur_left_overlap: i32,
}

impl<'a> CellPainter<'a> {
    pub(crate) fn new(
        cfg: &'a RenderConfig,
        tiles: &'a TileCache,
        surface: &'a mut Surface,
        cursors: &'a [Option<(i32, i32)>; CURSOR_KINDS],
    ) -> Self {
        Self {
            cfg,
            tiles,
            surface,
            cursors,
            cur_sy: 0,
            cur_left_overlap: 0,
        }
    }

    /// Paints the cell whose top-left pixel is (x, y). Returns the
    /// recorded `(sy, left_overlap)` overflow, or `None` when the cell had
    /// no terrain to paint.
    pub(crate) fn paint(
        &mut self,
        cell: &MapCell,
        cx: i32,
        cy: i32,
        x: i32,
        y: i32,
    ) -> Result<Option<(i32, i32)>> {
        let cw = self.cfg.cell_width;
        let ch = self.cfg.cell_height;
        self.surface.fill_rect(x, y, cw, ch, BLACK);

        let Some(t) = &cell.t else {
            // Nothing known here: flash and cursors only.
            self.render_flash(x, y, cell);
            self.render_cursors(cx, cy, x, y)?;
            return Ok(None);
        };

        self.cur_sy = 0;
        self.cur_left_overlap = 0;

        self.draw_background(x, y, t)?;

        // Occupant layers. A swimming occupant is drawn twice: clipped
        // above the water line at full (or half, if transparent) opacity,
        // and clipped below it heavily faded.
        if is_in_water(t) {
            let (above, below) = if t.trans { (0.5, 0.1) } else { (1.0, 0.3) };
            self.draw_dolls(x, y, t, above, Some(self.nonsubmerged_band(y)))?;
            self.draw_dolls(x, y, t, below, Some(self.submerged_band(y)))?;
        } else {
            let alpha = if t.trans { 0.55 } else { 1.0 };
            self.draw_dolls(x, y, t, alpha, None)?;
        }

        self.draw_foreground(x, y, t)?;

        // Main-range overlays (zaps and the like) go over everything.
        if let Some(ov) = &t.ov {
            for &overlay in ov {
                if overlay > TILE_DNGN_MAX && overlay <= TILE_MAIN_MAX {
                    self.draw_main(overlay, x, y, 1.0, None)?;
                }
            }
        }

        self.render_flash(x, y, cell);
        self.render_cursors(cx, cy, x, y)?;

        if let Some(mark) = &t.mark {
            self.surface.draw_text_centered(
                mark,
                x + cw as i32 / 2,
                y + ch as i32 / 2,
                MARK_COLOR,
            );
        }

        Ok(Some((self.cur_sy, self.cur_left_overlap)))
    }

    fn draw_background(&mut self, x: i32, y: i32, t: &CellView) -> Result<()> {
        let bg_idx = t.bg.tile;
        let bg = t.bg.flags;

        if t.mangrove_water && bg_idx > TILE_DNGN_UNSEEN {
            self.draw_dngn(TILE_SHALLOW_WATER, x, y)?;
        } else if bg_idx >= TILE_FIRST_TRANSPARENT {
            // Transparent features sit on their own floor tile.
            self.draw_dngn(t.flv.f, x, y)?;

            if let Some(ov) = &t.ov {
                for &overlay in ov {
                    if overlay != 0 && overlay <= TILE_FLOOR_MAX {
                        self.draw_dngn(overlay, x, y)?;
                    }
                }
            }
        }

        // Blood goes beneath feature tiles but on top of wall tiles.
        if bg_idx > TILE_WALL_MAX {
            self.draw_blood_overlay(x, y, t, false)?;
        }

        if t.mangrove_water && bg_idx > TILE_DNGN_UNSEEN {
            // A tree rising out of water: crown opaque, trunk faded.
            self.draw_tile(bg_idx, x, y, 0, 0, None, 1.0, Some(self.nonsubmerged_band(y)))?;
            self.draw_tile(bg_idx, x, y, 0, 0, None, 0.3, Some(self.submerged_band(y)))?;
        } else {
            self.draw_dngn(bg_idx, x, y)?;
        }

        if bg_idx > TILE_DNGN_UNSEEN {
            if bg_idx <= TILE_WALL_MAX {
                self.draw_blood_overlay(x, y, t, bg_idx > TILE_FLOOR_MAX)?;
            }

            let mut ray_tile = 0u32;
            if let Some(ov) = &t.ov {
                for &overlay in ov {
                    if overlay > TILE_DNGN_MAX {
                        continue;
                    }
                    if overlay == TILE_RAY
                        || overlay == TILE_RAY_MULTI
                        || overlay == TILE_RAY_OUT_OF_RANGE
                    {
                        // Rays blend wrong under later overlays; hold the
                        // (single) ray back until the rest are down.
                        ray_tile = overlay;
                    } else if overlay != 0
                        && (bg_idx < TILE_FIRST_TRANSPARENT || overlay > TILE_FLOOR_MAX)
                    {
                        self.draw_dngn(overlay, x, y)?;
                    }
                }
            }
            if ray_tile != 0 {
                self.draw_dngn(ray_tile, x, y)?;
            }

            if !bg.contains(BgFlags::UNSEEN) {
                if bg.contains(BgFlags::KRAKEN_NW) {
                    self.draw_dngn(TILE_KRAKEN_NW, x, y)?;
                }
                if bg.contains(BgFlags::KRAKEN_NE) {
                    self.draw_dngn(TILE_KRAKEN_NE, x, y)?;
                }
                if bg.contains(BgFlags::KRAKEN_SE) {
                    self.draw_dngn(TILE_KRAKEN_SE, x, y)?;
                }
                if bg.contains(BgFlags::KRAKEN_SW) {
                    self.draw_dngn(TILE_KRAKEN_SW, x, y)?;
                }

                if t.sanctuary {
                    self.draw_dngn(TILE_SANCTUARY, x, y)?;
                }
                if t.silenced {
                    self.draw_dngn(TILE_SILENCED, x, y)?;
                }
                if t.halo == 1 {
                    self.draw_dngn(TILE_HALO_RANGE, x, y)?;
                }
                if t.halo == 2 {
                    self.draw_dngn(TILE_UMBRA, x, y)?;
                }

                if t.fg.flags.contains(FgFlags::PET) {
                    self.draw_dngn(TILE_HALO_FRIENDLY, x, y)?;
                } else if t.fg.flags.contains(FgFlags::GD_NEUTRAL) {
                    self.draw_dngn(TILE_HALO_GD_NEUTRAL, x, y)?;
                } else if t.fg.flags.contains(FgFlags::NEUTRAL) {
                    self.draw_dngn(TILE_HALO_NEUTRAL, x, y)?;
                }

                // Travel exclusion under the foreground while the cell is
                // in sight; the unseen variant is applied later, on top.
                if bg.contains(BgFlags::EXCL_CTR) {
                    self.draw_dngn(TILE_TRAVEL_EXCL_CENTRE_BG, x, y)?;
                } else if bg.contains(BgFlags::TRAV_EXCL) {
                    self.draw_dngn(TILE_TRAVEL_EXCL_BG, x, y)?;
                }
            }
        }

        self.draw_ray(x, y, t)
    }

    /// Liquefaction, blood or mold, variant picked by the cell's flavour
    /// seed so the choice is stable across repaints.
    fn draw_blood_overlay(&mut self, x: i32, y: i32, t: &CellView, is_wall: bool) -> Result<()> {
        if t.liquefied && !is_wall {
            let offset = t.flv.s % self.tiles.tile_count(TILE_LIQUEFACTION);
            self.draw_dngn(TILE_LIQUEFACTION + offset, x, y)?;
        } else if t.bloody {
            let basetile = if is_wall { TILE_WALL_BLOOD } else { TILE_BLOOD };
            let offset = t.flv.s % self.tiles.tile_count(basetile);
            self.draw_dngn(basetile + offset, x, y)?;
        } else if t.moldy {
            let offset = t.flv.s % self.tiles.tile_count(TILE_MOLD);
            self.draw_dngn(TILE_MOLD + offset, x, y)?;
        }
        Ok(())
    }

    fn draw_ray(&mut self, x: i32, y: i32, t: &CellView) -> Result<()> {
        let bg = t.bg.flags;
        if bg.contains(BgFlags::RAY) {
            self.draw_dngn(TILE_RAY, x, y)?;
        } else if bg.contains(BgFlags::RAY_OOR) {
            self.draw_dngn(TILE_RAY_OUT_OF_RANGE, x, y)?;
        } else if bg.contains(BgFlags::LANDING) {
            self.draw_dngn(TILE_LANDING, x, y)?;
        } else if bg.contains(BgFlags::RAY_MULTI) {
            self.draw_dngn(TILE_RAY_MULTI, x, y)?;
        }
        Ok(())
    }

    /// Doll/equipment layers and cached monster-overlay parts. Doll parts
    /// matching an overlay part inherit its pixel offsets.
    fn draw_dolls(
        &mut self,
        x: i32,
        y: i32,
        t: &CellView,
        alpha: f32,
        band: Option<(i32, i32)>,
    ) -> Result<()> {
        let fg_idx = t.fg.tile;

        if fg_idx >= TILE_DOLL_START {
            if let Some(doll) = &t.doll {
                for part in doll {
                    let (ofsx, ofsy) = t
                        .mcache
                        .as_ref()
                        .and_then(|m| m.iter().find(|mc| mc.0 == part.0))
                        .map_or((0, 0), |mc| (mc.1, mc.2));
                    self.draw_tile(part.0, x, y, ofsx, ofsy, Some(part.1), alpha, band)?;
                }
            }
        }

        if fg_idx >= TILE_MCACHE_START {
            if let Some(mcache) = &t.mcache {
                for part in mcache {
                    self.draw_tile(part.0, x, y, part.1, part.2, None, alpha, band)?;
                }
            }
        }

        Ok(())
    }

    fn draw_foreground(&mut self, x: i32, y: i32, t: &CellView) -> Result<()> {
        let fg = t.fg.flags;
        let bg = t.bg.flags;
        let fg_idx = t.fg.tile;

        if fg_idx != 0 && fg_idx <= TILE_MAIN_MAX {
            if is_in_water(t) {
                let (above, below) = if t.trans { (0.5, 0.1) } else { (1.0, 0.3) };
                for (alpha, band) in [
                    (above, self.nonsubmerged_band(y)),
                    (below, self.submerged_band(y)),
                ] {
                    if t.base != 0 {
                        self.draw_main(t.base, x, y, alpha, Some(band))?;
                    }
                    self.draw_main(fg_idx, x, y, alpha, Some(band))?;
                }
            } else {
                if t.base != 0 {
                    self.draw_main(t.base, x, y, 1.0, None)?;
                }
                self.draw_main(fg_idx, x, y, 1.0, None)?;
            }
        }

        if fg.contains(FgFlags::NET) {
            self.draw_icon(ICON_NET, x, y, 0, 0)?;
        }
        if fg.contains(FgFlags::S_UNDER) {
            self.draw_icon(ICON_SOMETHING_UNDER, x, y, 0, 0)?;
        }
        if fg.contains(FgFlags::MIMIC) {
            self.draw_icon(ICON_MIMIC, x, y, 0, 0)?;
        }

        if fg.contains(FgFlags::PET) {
            self.draw_icon(ICON_HEART, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::GD_NEUTRAL) {
            self.draw_icon(ICON_GOOD_NEUTRAL, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::NEUTRAL) {
            self.draw_icon(ICON_NEUTRAL, x, y, 0, 0)?;
        }

        // Icons sharing the bottom-left anchor slide sideways by an
        // accumulating shift so none of them fully covers another.
        let mut status_shift = 0;
        if fg.contains(FgFlags::STAB) {
            self.draw_icon(ICON_STAB_BRAND, x, y, 0, 0)?;
            status_shift += 12;
        } else if fg.contains(FgFlags::MAY_STAB) {
            self.draw_icon(ICON_MAY_STAB_BRAND, x, y, 0, 0)?;
            status_shift += 7;
        } else if fg.contains(FgFlags::FLEEING) {
            self.draw_icon(ICON_FLEEING, x, y, 0, 0)?;
            status_shift += 3;
        }

        if fg.contains(FgFlags::POISON) {
            self.draw_icon(ICON_POISON, x, y, -status_shift, 0)?;
            status_shift += 5;
        }
        if fg.contains(FgFlags::STICKY_FLAME) {
            self.draw_icon(ICON_STICKY_FLAME, x, y, -status_shift, 0)?;
            status_shift += 7;
        }
        if fg.contains(FgFlags::INNER_FLAME) {
            self.draw_icon(ICON_INNER_FLAME, x, y, -status_shift, 0)?;
            status_shift += 7;
        }

        // Bottom-right anchor, no shift needed.
        if fg.contains(FgFlags::BERSERK) {
            self.draw_icon(ICON_BERSERK, x, y, 0, 0)?;
        }
        if fg.contains(FgFlags::ANIM_WEP) {
            self.draw_icon(ICON_ANIMATED_WEAPON, x, y, 0, 0)?;
        }

        let has_content = t.bg.tile != 0 || fg_idx != 0;
        if bg.contains(BgFlags::UNSEEN) && has_content {
            self.draw_icon(ICON_MESH, x, y, 0, 0)?;
        }
        if bg.contains(BgFlags::OOR) && has_content {
            self.draw_icon(ICON_OOR_MESH, x, y, 0, 0)?;
        }
        if bg.contains(BgFlags::MM_UNSEEN) && has_content {
            self.draw_icon(ICON_MAGIC_MAP_MESH, x, y, 0, 0)?;
        }

        // The "new stair" markers must not cover any status icon.
        if bg.contains(BgFlags::NEW_STAIR) && status_shift == 0 {
            self.draw_icon(ICON_NEW_STAIR, x, y, 0, 0)?;
        }
        if bg.contains(BgFlags::NEW_TRANSPORTER) && status_shift == 0 {
            self.draw_icon(ICON_NEW_TRANSPORTER, x, y, 0, 0)?;
        }

        if bg.contains(BgFlags::EXCL_CTR) && bg.contains(BgFlags::UNSEEN) {
            self.draw_icon(ICON_TRAVEL_EXCL_CENTRE_FG, x, y, 0, 0)?;
        } else if bg.contains(BgFlags::TRAV_EXCL) && bg.contains(BgFlags::UNSEEN) {
            self.draw_icon(ICON_TRAVEL_EXCL_FG, x, y, 0, 0)?;
        }

        // Exactly one pointer cursor; tutorial beats the ordinary one
        // beats the secondary beats the tertiary.
        if bg.contains(BgFlags::TUT_CURSOR) {
            self.draw_icon(ICON_TUTORIAL_CURSOR, x, y, 0, 0)?;
        } else if bg.contains(BgFlags::CURSOR1) {
            self.draw_icon(ICON_CURSOR, x, y, 0, 0)?;
        } else if bg.contains(BgFlags::CURSOR2) {
            self.draw_icon(ICON_CURSOR2, x, y, 0, 0)?;
        } else if bg.contains(BgFlags::CURSOR3) {
            self.draw_icon(ICON_CURSOR3, x, y, 0, 0)?;
        }

        if fg.contains(FgFlags::MDAM_LIGHT) {
            self.draw_icon(ICON_MDAM_LIGHTLY_DAMAGED, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::MDAM_MOD) {
            self.draw_icon(ICON_MDAM_MODERATELY_DAMAGED, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::MDAM_HEAVY) {
            self.draw_icon(ICON_MDAM_HEAVILY_DAMAGED, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::MDAM_SEV) {
            self.draw_icon(ICON_MDAM_SEVERELY_DAMAGED, x, y, 0, 0)?;
        } else if fg.contains(FgFlags::MDAM_ADEAD) {
            self.draw_icon(ICON_MDAM_ALMOST_DEAD, x, y, 0, 0)?;
        }

        if self.cfg.show_demon_tiers {
            if fg.contains(FgFlags::DEMON_1) {
                self.draw_icon(ICON_DEMON_NUM1, x, y, 0, 0)?;
            } else if fg.contains(FgFlags::DEMON_2) {
                self.draw_icon(ICON_DEMON_NUM2, x, y, 0, 0)?;
            } else if fg.contains(FgFlags::DEMON_3) {
                self.draw_icon(ICON_DEMON_NUM3, x, y, 0, 0)?;
            } else if fg.contains(FgFlags::DEMON_4) {
                self.draw_icon(ICON_DEMON_NUM4, x, y, 0, 0)?;
            } else if fg.contains(FgFlags::DEMON_5) {
                self.draw_icon(ICON_DEMON_NUM5, x, y, 0, 0)?;
            }
        }

        Ok(())
    }

    fn render_flash(&mut self, x: i32, y: i32, cell: &MapCell) {
        if let Some(flash) = cell.flash {
            if flash.a > 0 {
                let color = (flash.r as u32) << 16 | (flash.g as u32) << 8 | flash.b as u32;
                self.surface.blend_rect(
                    x,
                    y,
                    self.cfg.cell_width,
                    self.cfg.cell_height,
                    0xFF00_0000 | color,
                    flash.a as f32 / 255.0,
                );
            }
        }
    }

    /// Registered cursors (mouse, map, tutorial) are independent of the
    /// packed-flag cursor and can coexist; they draw in kind order.
    fn render_cursors(&mut self, cx: i32, cy: i32, x: i32, y: i32) -> Result<()> {
        for kind in CursorKind::ALL {
            if self.cursors[kind as usize] == Some((cx, cy)) {
                let icon = match kind {
                    CursorKind::Tutorial => ICON_TUTORIAL_CURSOR,
                    CursorKind::Mouse | CursorKind::Map => ICON_CURSOR,
                };
                self.draw_icon(icon, x, y, 0, 0)?;
            }
        }
        Ok(())
    }

    #[inline]
    fn submerged_band(&self, y: i32) -> (i32, i32) {
        (y + self.cfg.water_level, self.surface.height() as i32)
    }

    #[inline]
    fn nonsubmerged_band(&self, y: i32) -> (i32, i32) {
        (0, y + self.cfg.water_level)
    }

    fn draw_dngn(&mut self, idx: u32, x: i32, y: i32) -> Result<()> {
        self.draw_tile(idx, x, y, 0, 0, None, 1.0, None)
    }

    fn draw_main(
        &mut self,
        idx: u32,
        x: i32,
        y: i32,
        alpha: f32,
        band: Option<(i32, i32)>,
    ) -> Result<()> {
        self.draw_tile(idx, x, y, 0, 0, None, alpha, band)
    }

    fn draw_icon(&mut self, idx: u32, x: i32, y: i32, ofsx: i32, ofsy: i32) -> Result<()> {
        self.draw_tile(idx, x, y, ofsx, ofsy, None, 1.0, None)
    }

    /// Core tile blit. The tile is anchored bottom-centered in its cell,
    /// then shifted by its own offsets plus the caller's; negative
    /// resulting offsets spill into the neighboring cells and are
    /// recorded for the overlap-repaint rule. `y_max` caps the drawn
    /// height (doll parts use it to hide legs behind mounts).
    #[allow(clippy::too_many_arguments)]
    fn draw_tile(
        &mut self,
        idx: u32,
        x: i32,
        y: i32,
        ofsx: i32,
        ofsy: i32,
        y_max: Option<i32>,
        alpha: f32,
        band: Option<(i32, i32)>,
    ) -> Result<()> {
        let info = *self.tiles.info(idx)?;
        let sheet = self
            .tiles
            .sheet(info.sheet)
            .ok_or_else(|| anyhow!("tile {idx:#06x} references missing sheet {}", info.sheet))?;

        let cell = CELL_PX as i32;
        let size_ox = cell / 2 - info.w as i32 / 2;
        let size_oy = cell - info.h as i32;

        let sy = ofsy + info.oy + size_oy;
        let mut ey = sy + (info.ey - info.sy) as i32;
        if let Some(y_max) = y_max {
            if y_max < ey {
                ey = y_max;
            }
        }
        if sy >= ey {
            return Ok(());
        }

        let total_x_offset = ofsx + info.ox + size_ox;
        if total_x_offset < self.cur_left_overlap {
            self.cur_left_overlap = total_x_offset;
        }
        if sy < self.cur_sy {
            self.cur_sy = sy;
        }

        self.surface.draw_image_region(
            sheet,
            info.sx,
            info.sy,
            info.ex - info.sx,
            (ey - sy) as u32,
            x + total_x_offset,
            y + sy,
            alpha,
            band,
        );

        Ok(())
    }
}
