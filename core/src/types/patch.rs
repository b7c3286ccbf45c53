//! Wire types for incremental world patches.
//!
//! The server streams partial cell descriptions; every field is optional
//! and only present fields are merged client-side. Coordinates may be
//! elided entirely, in which case the receiver advances a run cursor
//! (previous x + 1, same y).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One partial cell update.
///
/// `mon` is tri-state on the wire: absent leaves the cell's monster alone,
/// an explicit `null` detaches it, and a payload merges into the monster
/// cache.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CellPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(
        default,
        deserialize_with = "some_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub mon: Option<Option<MonsterPatch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<TerrainPatch>,
    /// Minimap feature code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mf: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
    /// Unknown keys are kept verbatim and overwrite on merge.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Deserializes a present-but-possibly-null field into `Some(Option<T>)`,
/// so absence stays distinguishable from an explicit `null`.
fn some_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Partial terrain/appearance payload, shallow-merged per present field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TerrainPatch {
    /// Packed foreground word (tile index + flags).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<u64>,
    /// Packed background word.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<u64>,
    /// Item-pile tile drawn under the occupant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flv: Option<FlavourPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doll: Option<Vec<DollPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcache: Option<Vec<McachePart>>,
    /// Overlay tile ids, drawn in order by range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ov: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloody: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moldy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquefied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangrove_water: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanctuary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silenced: Option<bool>,
    /// 0 = none, 1 = halo, 2 = umbra.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halo: Option<u8>,
    /// Debug label painted centered in the cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
}

/// Floor variant selector and special-overlay seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct FlavourPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u32>,
}

/// One doll/equipment layer: (part tile, max pixel row to draw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DollPart(pub u32, pub i32);

/// One cached monster-overlay part: (part tile, x offset, y offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct McachePart(pub u32, pub i32, pub i32);

/// Partial monster payload. `id` is required for a payload to be usable;
/// everything else merges into the cached entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MonsterPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub typ: Option<i32>,
    /// 0 = hostile; the server omits it for hostiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attitude: Option<i32>,
    /// Hp bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clientid: Option<u64>,
}

/// Full-cell color flash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Flash {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0 disables the flash.
    pub a: u8,
}
