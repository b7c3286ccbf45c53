mod cell_draw;
pub mod surface;
pub mod tile_cache;
pub mod viewport;

pub use surface::Surface;
pub use tile_cache::{AnimKind, TileCache, TileImage, TileInfo};
pub use viewport::{CursorKind, RenderConfig, ViewportRenderer};
