//! Tile references and gid flag handling.

/// Horizontal flip flag (bit 31).
pub const FLIP_H: u32 = 0x8000_0000;
/// Vertical flip flag (bit 30).
pub const FLIP_V: u32 = 0x4000_0000;
/// Anti-diagonal flip flag (bit 29).
pub const FLIP_D: u32 = 0x2000_0000;
/// Keep the lower 29 bits.
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// Strip the flip/rotation flags from a raw gid.
#[inline]
pub fn clean_gid(gid: u32) -> u32 {
    gid & GID_MASK
}

/// A tile placed in a layer or carried by a tile object.
///
/// `tileset` is the tileset's position in the map's [`TilesetGroup`]; the
/// reference does not own the tileset.
///
/// [`TilesetGroup`]: crate::TilesetGroup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    /// Column, in tiles
    pub x: u32,
    /// Row, in tiles
    pub y: u32,
    gid: u32,
    tileset: usize,
    local_id: u32,
}

impl TileRef {
    pub(crate) fn new(x: u32, y: u32, gid: u32, tileset: usize, firstgid: u32) -> Self {
        TileRef {
            x,
            y,
            gid,
            tileset,
            local_id: clean_gid(gid).saturating_sub(firstgid),
        }
    }

    /// Gid with flip flags still encoded.
    #[inline]
    pub fn raw_gid(&self) -> u32 {
        self.gid
    }

    /// Gid with flip flags cleared.
    #[inline]
    pub fn tile_id(&self) -> u32 {
        clean_gid(self.gid)
    }

    /// Tile id inside its tileset.
    #[inline]
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// Index of the owning tileset in the map's tileset group.
    #[inline]
    pub fn tileset_index(&self) -> usize {
        self.tileset
    }

    #[inline]
    pub fn flipped_x(&self) -> bool {
        self.gid & FLIP_H != 0
    }

    #[inline]
    pub fn flipped_y(&self) -> bool {
        self.gid & FLIP_V != 0
    }

    #[inline]
    pub fn flipped_ad(&self) -> bool {
        self.gid & FLIP_D != 0
    }

    /// True when any flip/rotation flag is set.
    #[inline]
    pub fn flipped(&self) -> bool {
        self.flipped_x() || self.flipped_y() || self.flipped_ad()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_split_from_gid() {
        let tile = TileRef::new(2, 3, 5 | FLIP_H | FLIP_D, 0, 1);
        assert_eq!(tile.tile_id(), 5);
        assert_eq!(tile.local_id(), 4);
        assert!(tile.flipped_x());
        assert!(!tile.flipped_y());
        assert!(tile.flipped_ad());
        assert!(tile.flipped());
        assert_eq!(tile.raw_gid() & GID_MASK, 5);
    }

    #[test]
    fn plain_gid_is_not_flipped() {
        let tile = TileRef::new(0, 0, 1, 0, 1);
        assert!(!tile.flipped());
        assert_eq!(tile.local_id(), 0);
    }
}
