//! Client-side world model and viewport renderer.
//!
//! The server streams partial cell patches; this crate rebuilds a sparse
//! world from them and keeps a scrolling pixel viewport in sync, redrawing
//! only what changed. The surrounding UI (chat, menus, minimap display,
//! monster list, networking) lives elsewhere and talks to this crate
//! through [`frame::FrameController`] and the query surface on
//! [`map::WorldStore`].

pub mod frame;
pub mod map;
pub mod patch;
pub mod render;

pub use frame::{ControlMessage, FrameController, MinimapSink, MonsterListSink, ViewReporter};
pub use map::{Bounds, CellView, MapCell, MonsterEntry, MonsterId, WorldStore};
pub use patch::PatchProcessor;
pub use render::{CursorKind, RenderConfig, Surface, TileCache, TileImage, TileInfo, ViewportRenderer};
