//! Constants module - cell geometry, the tile-id layout shared with the
//! server, and the packed foreground/background cell words.

use bitflags::bitflags;

// =============================================================================
// Cell geometry
// =============================================================================

/// Logical tile size in pixels; tile sheets are authored at this size.
pub const CELL_PX: u32 = 32;

/// Pixel row (from the cell top) where the water surface sits. Everything
/// painted below this row inside a water cell counts as submerged. Kept as
/// a default; the renderer reads it from its config, never from here
/// directly.
pub const WATER_LEVEL_PX: i32 = 20;

/// The per-frame animation counter wraps here.
pub const ANIM_COUNTER_WRAP: u32 = 65536;

// =============================================================================
// Tile-id layout
// =============================================================================
//
// Tile ids fit in the low 16 bits of a packed cell word. The id space is
// partitioned into ranges; range membership decides which drawing pass a
// tile belongs to.

/// The "nothing known" background tile.
pub const TILE_DNGN_UNSEEN: u32 = 0;
/// Last floor tile.
pub const TILE_FLOOR_MAX: u32 = 0x0FFF;
/// Last wall tile.
pub const TILE_WALL_MAX: u32 = 0x1FFF;
/// First feature tile drawn over a separate floor tile.
pub const TILE_FIRST_TRANSPARENT: u32 = 0x2800;
/// Last dungeon-texture tile (features, rays, dungeon overlays).
pub const TILE_DNGN_MAX: u32 = 0x3FFF;
/// Last item/monster base tile. Overlays above TILE_DNGN_MAX and up to
/// here are drawn in the main-overlay pass.
pub const TILE_MAIN_MAX: u32 = 0x7FFF;
/// First doll/equipment-layer part.
pub const TILE_DOLL_START: u32 = 0x8000;
/// First cached monster-overlay part.
pub const TILE_MCACHE_START: u32 = 0xA000;

// Animated background families. Variant counts are registered with the
// tile cache by the asset pipeline; only the bases are fixed here.

/// Lava family base; its four phases step with the global counter.
pub const TILE_LAVA: u32 = 0x0800;
pub const TILE_DEEP_WATER: u32 = 0x0810;
pub const TILE_SHALLOW_WATER: u32 = 0x0820;
/// Wall-mounted torch family base.
pub const TILE_TORCH_WALL: u32 = 0x1800;

// Dungeon-texture specials referenced by the cell pipeline.

pub const TILE_LIQUEFACTION: u32 = 0x3100;
pub const TILE_BLOOD: u32 = 0x3110;
pub const TILE_WALL_BLOOD: u32 = 0x3120;
pub const TILE_MOLD: u32 = 0x3130;
pub const TILE_SANCTUARY: u32 = 0x3140;
pub const TILE_SILENCED: u32 = 0x3141;
pub const TILE_HALO_RANGE: u32 = 0x3142;
pub const TILE_UMBRA: u32 = 0x3143;
pub const TILE_HALO_FRIENDLY: u32 = 0x3144;
pub const TILE_HALO_GD_NEUTRAL: u32 = 0x3145;
pub const TILE_HALO_NEUTRAL: u32 = 0x3146;
pub const TILE_RAY: u32 = 0x3150;
pub const TILE_RAY_OUT_OF_RANGE: u32 = 0x3151;
pub const TILE_RAY_MULTI: u32 = 0x3152;
pub const TILE_LANDING: u32 = 0x3153;
pub const TILE_TRAVEL_EXCL_BG: u32 = 0x3160;
pub const TILE_TRAVEL_EXCL_CENTRE_BG: u32 = 0x3161;
pub const TILE_KRAKEN_NW: u32 = 0x3170;
pub const TILE_KRAKEN_NE: u32 = 0x3171;
pub const TILE_KRAKEN_SE: u32 = 0x3172;
pub const TILE_KRAKEN_SW: u32 = 0x3173;

// Status and cursor icons live in their own range above the cell words'
// tile space; they are only ever drawn, never stored in a cell word.

pub const ICON_NET: u32 = 0xC000;
pub const ICON_SOMETHING_UNDER: u32 = 0xC001;
pub const ICON_MIMIC: u32 = 0xC002;
pub const ICON_HEART: u32 = 0xC003;
pub const ICON_GOOD_NEUTRAL: u32 = 0xC004;
pub const ICON_NEUTRAL: u32 = 0xC005;
pub const ICON_STAB_BRAND: u32 = 0xC006;
pub const ICON_MAY_STAB_BRAND: u32 = 0xC007;
pub const ICON_FLEEING: u32 = 0xC008;
pub const ICON_POISON: u32 = 0xC009;
pub const ICON_STICKY_FLAME: u32 = 0xC00A;
pub const ICON_INNER_FLAME: u32 = 0xC00B;
pub const ICON_BERSERK: u32 = 0xC00C;
pub const ICON_ANIMATED_WEAPON: u32 = 0xC00D;
pub const ICON_MESH: u32 = 0xC00E;
pub const ICON_OOR_MESH: u32 = 0xC00F;
pub const ICON_MAGIC_MAP_MESH: u32 = 0xC010;
pub const ICON_NEW_STAIR: u32 = 0xC011;
pub const ICON_NEW_TRANSPORTER: u32 = 0xC012;
pub const ICON_TRAVEL_EXCL_FG: u32 = 0xC013;
pub const ICON_TRAVEL_EXCL_CENTRE_FG: u32 = 0xC014;
pub const ICON_CURSOR: u32 = 0xC015;
pub const ICON_CURSOR2: u32 = 0xC016;
pub const ICON_CURSOR3: u32 = 0xC017;
pub const ICON_TUTORIAL_CURSOR: u32 = 0xC018;
pub const ICON_MDAM_LIGHTLY_DAMAGED: u32 = 0xC019;
pub const ICON_MDAM_MODERATELY_DAMAGED: u32 = 0xC01A;
pub const ICON_MDAM_HEAVILY_DAMAGED: u32 = 0xC01B;
pub const ICON_MDAM_SEVERELY_DAMAGED: u32 = 0xC01C;
pub const ICON_MDAM_ALMOST_DEAD: u32 = 0xC01D;
pub const ICON_DEMON_NUM1: u32 = 0xC01E;
pub const ICON_DEMON_NUM2: u32 = 0xC01F;
pub const ICON_DEMON_NUM3: u32 = 0xC020;
pub const ICON_DEMON_NUM4: u32 = 0xC021;
pub const ICON_DEMON_NUM5: u32 = 0xC022;

// =============================================================================
// Packed cell words
// =============================================================================
//
// The server packs a tile index and a flag set into one 64-bit word per
// layer. The low TILE_BITS bits are the tile index; flags start at bit 16.

/// Bits of a packed word holding the tile index.
pub const TILE_BITS: u32 = 16;
/// Mask extracting the tile index from a packed word.
pub const TILE_MASK: u64 = (1 << TILE_BITS) - 1;

bitflags! {
    /// Foreground (occupant) flags of a packed cell word.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct FgFlags: u64 {
        /// an item is hidden under the occupant
        const S_UNDER       = 1 << 16;
        const FLYING        = 1 << 17;
        /// caught in a net
        const NET           = 1 << 18;
        const PET           = 1 << 19;
        const GD_NEUTRAL    = 1 << 20;
        const NEUTRAL       = 1 << 21;
        const STAB          = 1 << 22;
        const MAY_STAB      = 1 << 23;
        const FLEEING       = 1 << 24;
        const POISON        = 1 << 25;
        const STICKY_FLAME  = 1 << 26;
        const INNER_FLAME   = 1 << 27;
        const BERSERK       = 1 << 28;
        /// might not be what it looks like
        const MIMIC         = 1 << 29;
        const ANIM_WEP      = 1 << 30;
        const MDAM_LIGHT    = 1 << 31;
        const MDAM_MOD      = 1 << 32;
        const MDAM_HEAVY    = 1 << 33;
        const MDAM_SEV      = 1 << 34;
        const MDAM_ADEAD    = 1 << 35;
        const DEMON_1       = 1 << 36;
        const DEMON_2       = 1 << 37;
        const DEMON_3       = 1 << 38;
        const DEMON_4       = 1 << 39;
        const DEMON_5       = 1 << 40;
    }
}

bitflags! {
    /// Background (terrain) flags of a packed cell word.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct BgFlags: u64 {
        /// known from memory, not currently seen
        const UNSEEN          = 1 << 16;
        /// revealed by magic mapping, never actually seen
        const MM_UNSEEN       = 1 << 17;
        /// seen but out of visual range
        const OOR             = 1 << 18;
        const WATER           = 1 << 19;
        const RAY             = 1 << 20;
        const RAY_OOR         = 1 << 21;
        const RAY_MULTI       = 1 << 22;
        const LANDING         = 1 << 23;
        const CURSOR1         = 1 << 24;
        const CURSOR2         = 1 << 25;
        const CURSOR3         = 1 << 26;
        const TUT_CURSOR      = 1 << 27;
        const TRAV_EXCL       = 1 << 28;
        const EXCL_CTR        = 1 << 29;
        const NEW_STAIR       = 1 << 30;
        const NEW_TRANSPORTER = 1 << 31;
        const KRAKEN_NW       = 1 << 32;
        const KRAKEN_NE       = 1 << 33;
        const KRAKEN_SE       = 1 << 34;
        const KRAKEN_SW       = 1 << 35;
    }
}

/// Split foreground word: tile index plus flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFg {
    pub tile: u32,
    pub flags: FgFlags,
}

impl CellFg {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self {
            tile: (raw & TILE_MASK) as u32,
            flags: FgFlags::from_bits_truncate(raw & !TILE_MASK),
        }
    }

    #[inline]
    pub fn raw(self) -> u64 {
        (self.tile as u64 & TILE_MASK) | self.flags.bits()
    }
}

/// Split background word: tile index plus flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellBg {
    pub tile: u32,
    pub flags: BgFlags,
}

impl CellBg {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self {
            tile: (raw & TILE_MASK) as u32,
            flags: BgFlags::from_bits_truncate(raw & !TILE_MASK),
        }
    }

    #[inline]
    pub fn raw(self) -> u64 {
        (self.tile as u64 & TILE_MASK) | self.flags.bits()
    }
}
