//! The scrolling viewport: a camera-anchored window onto the world grid
//! painting into one pixel surface.
//!
//! Camera moves are realized as a single self-blit of the pixels that
//! stay on screen plus an explicit repaint of the bands that came newly
//! into view; everything else repaints per dirty cell.

use rand::Rng;

use delve_core::constants::ANIM_COUNTER_WRAP;
use delve_core::constants::{CELL_PX, WATER_LEVEL_PX};

use crate::map::WorldStore;
use crate::render::cell_draw::CellPainter;
use crate::render::surface::{Surface, BLACK};
use crate::render::tile_cache::{AnimKind, TileCache};

pub const CURSOR_KINDS: usize = 3;

/// Registered cursor kinds, drawn in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Mouse = 0,
    Map = 1,
    Tutorial = 2,
}

impl CursorKind {
    pub const ALL: [CursorKind; CURSOR_KINDS] =
        [CursorKind::Mouse, CursorKind::Map, CursorKind::Tutorial];
}

/// Rendering knobs. `water_level` is the pixel row of the water surface
/// inside a cell; it is configuration on purpose, every clip derives from
/// this one value.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub cell_width: u32,
    pub cell_height: u32,
    pub water_level: i32,
    pub show_demon_tiers: bool,
    pub water_anim: bool,
    pub misc_anim: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cell_width: CELL_PX,
            cell_height: CELL_PX,
            water_level: WATER_LEVEL_PX,
            show_demon_tiers: true,
            water_anim: true,
            misc_anim: true,
        }
    }
}

pub struct ViewportRenderer {
    cfg: RenderConfig,
    tiles: TileCache,
    /// None until `init`; every painting entry point is a no-op before.
    surface: Option<Surface>,
    cols: i32,
    rows: i32,
    view: (i32, i32),
    view_center: (i32, i32),
    cursors: [Option<(i32, i32)>; CURSOR_KINDS],
    anim_counter: u32,
}

impl ViewportRenderer {
    pub fn new(cfg: RenderConfig, tiles: TileCache) -> Self {
        Self {
            cfg,
            tiles,
            surface: None,
            cols: 0,
            rows: 0,
            view: (0, 0),
            view_center: (0, 0),
            cursors: [None; CURSOR_KINDS],
            anim_counter: 0,
        }
    }

    /// Hands the renderer its pixel surface and makes it ready.
    pub fn init(&mut self, surface: Surface) {
        self.surface = Some(surface);
    }

    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    pub fn tiles(&self) -> &TileCache {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileCache {
        &mut self.tiles
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    /// Top-left world cell of the view rectangle.
    pub fn view(&self) -> (i32, i32) {
        self.view
    }

    pub fn in_view(&self, cx: i32, cy: i32) -> bool {
        cx >= self.view.0
            && cx < self.view.0 + self.cols
            && cy >= self.view.1
            && cy < self.view.1 + self.rows
    }

    /// Resizes the view to `cols` x `rows` cells around the current
    /// center. The surface is rebuilt opaque black; the caller re-renders.
    pub fn set_size(&mut self, cols: i32, rows: i32) {
        if self.surface.is_none() {
            log::warn!("set_size before init");
            return;
        }
        let width = cols as u32 * self.cfg.cell_width;
        let height = rows as u32 * self.cfg.cell_height;
        if self.cols == cols
            && self.rows == rows
            && self
                .surface
                .as_ref()
                .is_some_and(|s| s.width() == width && s.height() == height)
        {
            return;
        }

        self.cols = cols;
        self.rows = rows;
        self.view = (
            self.view_center.0 - cols / 2,
            self.view_center.1 - rows / 2,
        );
        self.surface = Some(Surface::new(width, height));
    }

    /// Re-centers the camera; the only path that moves the view. The
    /// pixel delta is realized through `shift`.
    pub fn set_view_center(&mut self, store: &mut WorldStore, x: i32, y: i32) {
        self.view_center = (x, y);
        let old_view = self.view;
        self.view = (x - self.cols / 2, y - self.rows / 2);
        self.do_shift(store, self.view.0 - old_view.0, self.view.1 - old_view.1);
    }

    /// Moves the view by (dx, dy) cells and repaints what came into view.
    pub fn shift(&mut self, store: &mut WorldStore, dx: i32, dy: i32) {
        self.view = (self.view.0 + dx, self.view.1 + dy);
        self.view_center = (self.view_center.0 + dx, self.view_center.1 + dy);
        self.do_shift(store, dx, dy);
    }

    /// Pixel-level realization of a view move that already happened:
    /// blit the surviving region, then repaint the uncovered bands on the
    /// leading edges.
    fn do_shift(&mut self, store: &mut WorldStore, x: i32, y: i32) {
        if self.surface.is_none() {
            return;
        }
        if x == 0 && y == 0 {
            return;
        }

        let x = x.clamp(-self.cols, self.cols);
        let y = y.clamp(-self.rows, self.rows);

        // Source/destination cell offsets of the surviving region.
        let (sx, dx) = if x > 0 { (x, 0) } else { (0, -x) };
        let (sy, dy) = if y > 0 { (y, 0) } else { (0, -y) };

        let cw = self.cfg.cell_width as i32;
        let ch = self.cfg.cell_height as i32;

        let w = (self.cols - x.abs()) * cw;
        let h = (self.rows - y.abs()) * ch;

        if w > 0 && h > 0 {
            if let Some(surface) = self.surface.as_mut() {
                surface.blit_self(sx * cw, sy * ch, w as u32, h as u32, dx * cw, dy * ch);
            }
        }

        // Repaint the exposed cells as up to four disjoint bands: full
        // rows at the top and bottom, partial columns in between (sized
        // so the corners are not painted twice).
        for cy in 0..dy {
            for cx in 0..self.cols {
                self.render_view_cell(store, cx, cy);
            }
        }
        for cy in dy..self.rows - sy {
            for cx in 0..dx {
                self.render_view_cell(store, cx, cy);
            }
            for cx in self.cols - sx..self.cols {
                self.render_view_cell(store, cx, cy);
            }
        }
        for cy in self.rows - sy..self.rows {
            for cx in 0..self.cols {
                self.render_view_cell(store, cx, cy);
            }
        }
    }

    #[inline]
    fn render_view_cell(&mut self, store: &mut WorldStore, vx: i32, vy: i32) {
        let px = vx * self.cfg.cell_width as i32;
        let py = vy * self.cfg.cell_height as i32;
        self.render_cell(store, self.view.0 + vx, self.view.1 + vy, px, py);
    }

    /// Repaints the cell at world (cx, cy) if it is in view, then gives
    /// the two cells whose sprites can overlap it one repaint each: the
    /// cell below when its last paint spilled upward, the cell to the
    /// right when it spilled leftward. The triggered repaints never
    /// propagate further.
    pub fn render_loc(&mut self, store: &mut WorldStore, cx: i32, cy: i32) {
        self.render_loc_depth(store, cx, cy, 0);
    }

    fn render_loc_depth(&mut self, store: &mut WorldStore, cx: i32, cy: i32, depth: u8) {
        if !self.in_view(cx, cy) {
            return;
        }

        let px = (cx - self.view.0) * self.cfg.cell_width as i32;
        let py = (cy - self.view.1) * self.cfg.cell_height as i32;
        self.render_cell(store, cx, cy, px, py);

        if depth > 0 {
            return;
        }

        if self.in_view(cx, cy + 1) {
            let spills_up = store
                .peek(cx, cy + 1)
                .and_then(|c| c.t.as_ref())
                .is_some_and(|t| t.sy < 0);
            if spills_up {
                self.render_loc_depth(store, cx, cy + 1, 1);
            }
        }

        if self.in_view(cx + 1, cy) {
            let spills_left = store
                .peek(cx + 1, cy)
                .and_then(|c| c.t.as_ref())
                .is_some_and(|t| t.left_overlap < 0);
            if spills_left {
                self.render_loc_depth(store, cx + 1, cy, 1);
            }
        }
    }

    /// One animation tick: every visible, animatable cell in view gets
    /// its displayed variant advanced and repainted.
    pub fn animate(&mut self, store: &mut WorldStore) {
        if self.surface.is_none() {
            return;
        }

        self.anim_counter = (self.anim_counter + 1) % ANIM_COUNTER_WRAP;

        for cy in self.view.1..self.view.1 + self.rows {
            for cx in self.view.0..self.view.0 + self.cols {
                let Some(cell) = store.peek(cx, cy) else {
                    continue;
                };
                if !WorldStore::visible(cell) {
                    continue;
                }
                let Some(t) = cell.t.as_ref() else {
                    continue;
                };

                let tile = t.bg.tile;
                let base = self.tiles.basetile(tile);
                let Some(kind) = self.tiles.anim_kind(base) else {
                    continue;
                };
                let enabled = match kind {
                    AnimKind::Cycle => self.cfg.misc_anim,
                    AnimKind::LavaPhase | AnimKind::Random => self.cfg.water_anim,
                };
                if !enabled {
                    continue;
                }

                let count = self.tiles.tile_count(base);
                let next = match kind {
                    AnimKind::Cycle => base + (tile - base + 1) % count,
                    AnimKind::LavaPhase => {
                        let phase = (tile - base) % 4;
                        base + (phase + 4 * self.anim_counter) % count
                    }
                    AnimKind::Random => base + rand::thread_rng().gen_range(0..count),
                };

                if let Some(t) = store.get_mut(cx, cy).t.as_mut() {
                    t.bg.tile = next;
                }

                let px = (cx - self.view.0) * self.cfg.cell_width as i32;
                let py = (cy - self.view.1) * self.cfg.cell_height as i32;
                self.render_cell(store, cx, cy, px, py);
            }
        }
    }

    /// Registers (or moves) a cursor, repainting the vacated and the
    /// occupied cell.
    pub fn place_cursor(&mut self, store: &mut WorldStore, kind: CursorKind, x: i32, y: i32) {
        let old = self.cursors[kind as usize].replace((x, y));
        if let Some((ox, oy)) = old {
            if (ox, oy) != (x, y) {
                self.render_loc(store, ox, oy);
            }
        }
        self.render_loc(store, x, y);
    }

    pub fn remove_cursor(&mut self, store: &mut WorldStore, kind: CursorKind) {
        if let Some((ox, oy)) = self.cursors[kind as usize].take() {
            self.render_loc(store, ox, oy);
        }
    }

    pub fn cursor(&self, kind: CursorKind) -> Option<(i32, i32)> {
        self.cursors[kind as usize]
    }

    /// Blanks the whole surface.
    pub fn clear_surface(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.fill(BLACK);
        }
    }

    /// Paints one cell. A failed paint (missing tile metadata) costs that
    /// cell only: it is logged and the cell stays a black placeholder.
    fn render_cell(&mut self, store: &mut WorldStore, cx: i32, cy: i32, px: i32, py: i32) {
        let cell = store.get_mut(cx, cy).clone();
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        let result = {
            let mut painter = CellPainter::new(&self.cfg, &self.tiles, surface, &self.cursors);
            painter.paint(&cell, cx, cy, px, py)
        };

        match result {
            Ok(Some((sy, left_overlap))) => {
                if let Some(t) = store.get_mut(cx, cy).t.as_mut() {
                    t.sy = sy;
                    t.left_overlap = left_overlap;
                }
            }
            Ok(None) => {}
            Err(err) => {
                log::error!("error while drawing cell ({cx}, {cy}): {err:#}");
                surface.fill_rect(px, py, self.cfg.cell_width, self.cfg.cell_height, BLACK);
            }
        }
    }
}
