//! Data types module - wire structures for the incremental world protocol

pub mod patch;

// Re-export all types
pub use patch::{CellPatch, DollPart, Flash, FlavourPatch, McachePart, MonsterPatch, TerrainPatch};
