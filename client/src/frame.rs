//! Frame orchestration: one inbound message at a time drives the
//! patch-apply / notify / redraw pass.
//!
//! Everything here is synchronous and single-threaded; patches and timer
//! ticks arrive as messages on one FIFO channel, so the patch cursor's
//! ordering assumption and the no-interleaving rule hold by construction.

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use delve_core::types::patch::CellPatch;

use crate::map::{Bounds, MapCell, MonsterEntry, WorldStore};
use crate::patch::PatchProcessor;
use crate::render::viewport::ViewportRenderer;

/// How long scrolling has to settle before the new view center is
/// reported back to the server.
pub const SCROLL_REPORT_DELAY: Duration = Duration::from_millis(300);

/// Minimap collaborator, fed one pixel per redrawn cell.
pub trait MinimapSink {
    fn recenter(&mut self, bounds: &Bounds);
    fn update_pixel(&mut self, x: i32, y: i32, cell: &MapCell);
}

/// Monster-list collaborator; `update_loc` maintains its per-location
/// cache, `refresh` recomputes the grouped display once per frame.
pub trait MonsterListSink {
    fn update_loc(&mut self, x: i32, y: i32, mon: Option<&MonsterEntry>);
    fn refresh(&mut self);
}

/// Outbound scroll-position reporting (the transport lives elsewhere).
pub trait ViewReporter {
    fn report_center(&mut self, x: i32, y: i32);
}

/// Inbound control surface as messages; one channel, strict FIFO.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Patch(Vec<CellPatch>),
    Clear,
    SetPlayerOnLevel(bool),
    SetViewCenter { x: i32, y: i32 },
    AnimTick,
    Shutdown,
}

/// Cancel-and-restart single-shot timer. Re-arming replaces the pending
/// deadline instead of queueing a second one.
#[derive(Debug, Default)]
pub struct Debouncer {
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True exactly once, when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

pub struct FrameController<M, L, R> {
    store: WorldStore,
    processor: PatchProcessor,
    renderer: ViewportRenderer,
    minimap: M,
    monster_list: L,
    reporter: R,
    animation_enabled: bool,
    scroll_report: Debouncer,
}

impl<M, L, R> FrameController<M, L, R>
where
    M: MinimapSink,
    L: MonsterListSink,
    R: ViewReporter,
{
    pub fn new(renderer: ViewportRenderer, minimap: M, monster_list: L, reporter: R) -> Self {
        Self {
            store: WorldStore::new(),
            processor: PatchProcessor::new(),
            renderer,
            minimap,
            monster_list,
            reporter,
            animation_enabled: true,
            scroll_report: Debouncer::default(),
        }
    }

    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    pub fn renderer(&self) -> &ViewportRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut ViewportRenderer {
        &mut self.renderer
    }

    /// One full frame pass for an inbound patch batch: apply, notify the
    /// minimap of bounds movement, redraw every dirty cell (feeding the
    /// minimap and monster list per cell), drain the dirty set, tick the
    /// animation, let the monster list regroup.
    pub fn handle_patch(&mut self, batch: &[CellPatch]) {
        self.processor.apply_batch(&mut self.store, batch);

        if self.store.reset_bounds_changed() {
            if let Some(bounds) = self.store.bounds() {
                self.minimap.recenter(bounds);
            }
        }

        let coords: Vec<(i32, i32)> = self.store.dirty().to_vec();
        for (x, y) in coords {
            let mon = self.store.resolve_monster(x, y).cloned();
            self.monster_list.update_loc(x, y, mon.as_ref());

            self.renderer.render_loc(&mut self.store, x, y);

            if let Some(cell) = self.store.peek(x, y) {
                self.minimap.update_pixel(x, y, cell);
            }
        }
        self.store.reset_dirty();

        self.renderer.animate(&mut self.store);
        self.monster_list.refresh();
    }

    /// Full reset: level change or reconnect.
    pub fn clear(&mut self) {
        self.store.clear();
        self.store.reset_dirty();
        self.processor.reset();
        self.renderer.clear_surface();
        self.scroll_report.cancel();
    }

    pub fn set_player_on_level(&mut self, on_level: bool) {
        self.store.set_player_on_level(on_level);
    }

    /// Moves the camera and (re)arms the debounced scroll report; rapid
    /// repeated scrolls collapse into one report.
    pub fn set_view_center(&mut self, x: i32, y: i32) {
        self.renderer.set_view_center(&mut self.store, x, y);
        self.scroll_report.arm(Instant::now(), SCROLL_REPORT_DELAY);
    }

    /// Animation is suppressible during teardown; a disabled tick does
    /// nothing at all.
    pub fn set_animation_enabled(&mut self, enabled: bool) {
        self.animation_enabled = enabled;
    }

    pub fn animation_tick(&mut self) {
        if self.animation_enabled {
            self.renderer.animate(&mut self.store);
        }
    }

    /// Fires due timers. Called after each handled message.
    pub fn poll_timers(&mut self, now: Instant) {
        if self.scroll_report.fire(now) {
            let (x, y) = self.renderer_center();
            self.reporter.report_center(x, y);
        }
    }

    fn renderer_center(&self) -> (i32, i32) {
        let (vx, vy) = self.renderer.view();
        (
            vx + self.renderer.cols() / 2,
            vy + self.renderer.rows() / 2,
        )
    }

    /// Dispatches one message; returns false on shutdown.
    pub fn handle_message(&mut self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::Patch(batch) => self.handle_patch(&batch),
            ControlMessage::Clear => self.clear(),
            ControlMessage::SetPlayerOnLevel(on_level) => self.set_player_on_level(on_level),
            ControlMessage::SetViewCenter { x, y } => self.set_view_center(x, y),
            ControlMessage::AnimTick => self.animation_tick(),
            ControlMessage::Shutdown => return false,
        }
        self.poll_timers(Instant::now());
        true
    }

    /// Actor loop: processes messages in arrival order until the channel
    /// closes or a shutdown message arrives.
    pub fn run(&mut self, rx: Receiver<ControlMessage>) {
        while let Ok(msg) = rx.recv() {
            if !self.handle_message(msg) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::Surface;
    use crate::render::tile_cache::{TileCache, TileImage, TileInfo};
    use crate::render::viewport::RenderConfig;
    use delve_core::constants::CELL_PX;
    use delve_core::types::patch::{MonsterPatch, TerrainPatch};
    use std::sync::mpsc;

    #[derive(Default)]
    struct RecordingMinimap {
        recenters: Vec<Bounds>,
        pixels: Vec<(i32, i32)>,
    }

    impl MinimapSink for RecordingMinimap {
        fn recenter(&mut self, bounds: &Bounds) {
            self.recenters.push(*bounds);
        }
        fn update_pixel(&mut self, x: i32, y: i32, _cell: &MapCell) {
            self.pixels.push((x, y));
        }
    }

    #[derive(Default)]
    struct RecordingMonsterList {
        locs: Vec<(i32, i32, Option<u64>)>,
        refreshes: usize,
    }

    impl MonsterListSink for RecordingMonsterList {
        fn update_loc(&mut self, x: i32, y: i32, mon: Option<&MonsterEntry>) {
            self.locs.push((x, y, mon.map(|m| m.id)));
        }
        fn refresh(&mut self) {
            self.refreshes += 1;
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        centers: Vec<(i32, i32)>,
    }

    impl ViewReporter for RecordingReporter {
        fn report_center(&mut self, x: i32, y: i32) {
            self.centers.push((x, y));
        }
    }

    type TestController =
        FrameController<RecordingMinimap, RecordingMonsterList, RecordingReporter>;

    fn controller() -> TestController {
        let mut tiles = TileCache::new();
        let sheet = tiles.add_sheet(TileImage::solid(CELL_PX, CELL_PX, 0x336699));
        for id in 0..32 {
            tiles.register(
                id,
                TileInfo {
                    sheet,
                    sx: 0,
                    sy: 0,
                    ex: CELL_PX,
                    ey: CELL_PX,
                    w: CELL_PX,
                    h: CELL_PX,
                    ..TileInfo::default()
                },
            );
        }

        let mut renderer = ViewportRenderer::new(RenderConfig::default(), tiles);
        renderer.init(Surface::new(8 * CELL_PX, 8 * CELL_PX));
        renderer.set_size(8, 8);

        let mut controller = TestController::new(
            renderer,
            RecordingMinimap::default(),
            RecordingMonsterList::default(),
            RecordingReporter::default(),
        );
        controller.set_view_center(4, 4);
        controller
    }

    fn terrain(x: i32, y: i32, bg: u64) -> CellPatch {
        CellPatch {
            x: Some(x),
            y: Some(y),
            t: Some(TerrainPatch {
                bg: Some(bg),
                ..TerrainPatch::default()
            }),
            ..CellPatch::default()
        }
    }

    #[test]
    fn patch_pass_notifies_collaborators_in_order() {
        let mut controller = controller();
        controller.handle_patch(&[terrain(1, 1, 3), terrain(2, 1, 4)]);

        // Bounds appeared for the first time.
        assert_eq!(controller.minimap.recenters.len(), 1);
        // Both dirty coords flowed to both collaborators.
        assert_eq!(
            controller.monster_list.locs,
            vec![(1, 1, None), (2, 1, None)]
        );
        assert_eq!(controller.minimap.pixels, vec![(1, 1), (2, 1)]);
        assert_eq!(controller.monster_list.refreshes, 1);
        // The dirty set was drained.
        assert!(controller.store().dirty().is_empty());
    }

    #[test]
    fn unchanged_bounds_do_not_recenter() {
        let mut controller = controller();
        controller.handle_patch(&[terrain(1, 1, 3)]);
        controller.handle_patch(&[terrain(1, 1, 4)]);

        assert_eq!(controller.minimap.recenters.len(), 1);
    }

    #[test]
    fn monster_ids_flow_to_the_monster_list() {
        let mut controller = controller();
        let patch = CellPatch {
            x: Some(2),
            y: Some(2),
            mon: Some(Some(MonsterPatch {
                id: Some(42),
                ..MonsterPatch::default()
            })),
            ..CellPatch::default()
        };
        controller.handle_patch(&[patch]);

        assert_eq!(controller.monster_list.locs, vec![(2, 2, Some(42))]);
    }

    #[test]
    fn clear_resets_world_cursor_and_dirty() {
        let mut controller = controller();
        controller.handle_patch(&[terrain(5, 5, 3)]);
        controller.clear();

        assert!(controller.store().is_empty());
        assert!(controller.store().dirty().is_empty());
        assert!(controller.store().bounds().is_none());

        // The elision cursor restarted: a fully elided patch lands on (0, 0).
        let elided = CellPatch {
            t: Some(TerrainPatch {
                bg: Some(1),
                ..TerrainPatch::default()
            }),
            ..CellPatch::default()
        };
        controller.handle_patch(&[elided]);
        assert!(controller.store().peek(0, 0).is_some());
    }

    #[test]
    fn animation_ticks_are_suppressible() {
        let mut controller = controller();
        controller.handle_patch(&[terrain(1, 1, 3)]);

        controller.set_animation_enabled(false);
        controller.animation_tick();

        controller.set_animation_enabled(true);
        controller.animation_tick();
    }

    #[test]
    fn scroll_report_debounces_to_the_last_position() {
        let mut controller = controller();
        controller.set_view_center(10, 10);
        controller.set_view_center(12, 12);

        // Not yet due.
        let now = Instant::now();
        controller.poll_timers(now);
        assert!(controller.reporter.centers.is_empty());

        controller.poll_timers(now + SCROLL_REPORT_DELAY + Duration::from_millis(1));
        assert_eq!(controller.reporter.centers, vec![(12, 12)]);

        // One-shot: no second report.
        controller.poll_timers(now + SCROLL_REPORT_DELAY * 4);
        assert_eq!(controller.reporter.centers.len(), 1);
    }

    #[test]
    fn debouncer_rearm_replaces_the_deadline() {
        let mut debouncer = Debouncer::default();
        let t0 = Instant::now();
        debouncer.arm(t0, Duration::from_millis(100));
        debouncer.arm(t0 + Duration::from_millis(50), Duration::from_millis(100));

        assert!(!debouncer.fire(t0 + Duration::from_millis(120)));
        assert!(debouncer.fire(t0 + Duration::from_millis(160)));
        assert!(!debouncer.fire(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn message_loop_preserves_fifo_and_stops_on_shutdown() {
        let mut controller = controller();
        let (tx, rx) = mpsc::channel();

        tx.send(ControlMessage::Patch(vec![terrain(5, 10, 1)]))
            .unwrap();
        // Elided continuation relies on the previous message being
        // processed first.
        tx.send(ControlMessage::Patch(vec![CellPatch {
            t: Some(TerrainPatch {
                bg: Some(2),
                ..TerrainPatch::default()
            }),
            ..CellPatch::default()
        }]))
        .unwrap();
        tx.send(ControlMessage::Shutdown).unwrap();
        tx.send(ControlMessage::Clear).unwrap();

        controller.run(rx);

        // (6, 10) proves the second batch saw the first batch's cursor;
        // the world still holding cells proves Clear never ran.
        assert!(controller.store().peek(6, 10).is_some());
        assert!(!controller.store().is_empty());
    }
}
