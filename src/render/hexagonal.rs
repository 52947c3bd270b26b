use super::{blit, MapGeometry, Orientation, StaggerAxis, StaggerIndex, TileRenderer, TileSurface};
use crate::layer::TileLayer;
use crate::tile::TileRef;
use crate::tileset::Tileset;
use macroquad::math::{ivec2, vec2, IVec2, Rect, Vec2};

const OFFSETS_STAGGER_X: [IVec2; 4] = [IVec2::new(0, 0), IVec2::new(1, -1), IVec2::new(1, 0), IVec2::new(2, 0)];
const OFFSETS_STAGGER_Y: [IVec2; 4] = [IVec2::new(0, 0), IVec2::new(-1, 1), IVec2::new(0, 1), IVec2::new(0, 2)];

/// Hexagonal renderer, flat-top (stagger axis x) or pointy-top (stagger axis y).
///
/// Also carries the stagger geometry shared with [`StaggeredRenderer`], which
/// is this renderer with zero-length hex sides.
///
/// [`StaggeredRenderer`]: super::StaggeredRenderer
#[derive(Debug, Clone)]
pub struct HexagonalRenderer {
    orientation: Orientation,
    cols: u32,
    rows: u32,
    // declared tile size, used to match layers
    tile_size: (u32, u32),
    pub(super) tilewidth: f32,
    pub(super) tileheight: f32,
    pub(super) stagger_x: bool,
    pub(super) stagger_even: bool,
    pub(super) sidelength_x: f32,
    pub(super) sidelength_y: f32,
    pub(super) sideoffset_x: f32,
    pub(super) sideoffset_y: f32,
    pub(super) columnwidth: f32,
    pub(super) rowheight: f32,
}

impl HexagonalRenderer {
    pub fn new(geometry: &MapGeometry) -> Self {
        // even sizes only, the half-tile maths relies on it
        let tilewidth = (geometry.tilewidth & !1) as f32;
        let tileheight = (geometry.tileheight & !1) as f32;
        let stagger_x = geometry.stagger_axis == StaggerAxis::X;

        let (mut sidelength_x, mut sidelength_y) = (0.0, 0.0);
        if geometry.orientation == Orientation::Hexagonal {
            if stagger_x {
                sidelength_x = geometry.hexsidelength as f32;
            } else {
                sidelength_y = geometry.hexsidelength as f32;
            }
        }

        let sideoffset_x = (tilewidth - sidelength_x) / 2.0;
        let sideoffset_y = (tileheight - sidelength_y) / 2.0;

        HexagonalRenderer {
            orientation: geometry.orientation,
            cols: geometry.cols,
            rows: geometry.rows,
            tile_size: (geometry.tilewidth, geometry.tileheight),
            tilewidth,
            tileheight,
            stagger_x,
            stagger_even: geometry.stagger_index == StaggerIndex::Even,
            sidelength_x,
            sidelength_y,
            sideoffset_x,
            sideoffset_y,
            columnwidth: sideoffset_x + sidelength_x,
            rowheight: sideoffset_y + sidelength_y,
        }
    }

    #[inline]
    fn parity(&self, i: i32) -> bool {
        ((i & 1) != 0) ^ self.stagger_even
    }

    /// Whether column `x` is shifted down by half a tile.
    pub fn do_stagger_x(&self, x: i32) -> bool {
        self.stagger_x && self.parity(x)
    }

    /// Whether row `y` is shifted right by half a tile.
    pub fn do_stagger_y(&self, y: i32) -> bool {
        !self.stagger_x && self.parity(y)
    }

    pub fn top_left(&self, x: i32, y: i32) -> IVec2 {
        if !self.stagger_x {
            if self.parity(y) { ivec2(x, y - 1) } else { ivec2(x - 1, y - 1) }
        } else if self.parity(x) {
            ivec2(x - 1, y)
        } else {
            ivec2(x - 1, y - 1)
        }
    }

    pub fn top_right(&self, x: i32, y: i32) -> IVec2 {
        if !self.stagger_x {
            if self.parity(y) { ivec2(x + 1, y - 1) } else { ivec2(x, y - 1) }
        } else if self.parity(x) {
            ivec2(x + 1, y)
        } else {
            ivec2(x + 1, y - 1)
        }
    }

    pub fn bottom_left(&self, x: i32, y: i32) -> IVec2 {
        if !self.stagger_x {
            if self.parity(y) { ivec2(x, y + 1) } else { ivec2(x - 1, y + 1) }
        } else if self.parity(x) {
            ivec2(x - 1, y + 1)
        } else {
            ivec2(x - 1, y)
        }
    }

    pub fn bottom_right(&self, x: i32, y: i32) -> IVec2 {
        if !self.stagger_x {
            if self.parity(y) { ivec2(x + 1, y + 1) } else { ivec2(x, y + 1) }
        } else if self.parity(x) {
            ivec2(x + 1, y + 1)
        } else {
            ivec2(x + 1, y)
        }
    }

    /// Top-left of the bounding box of the tile at integer coordinates.
    pub(super) fn tile_origin(&self, x: i32, y: i32) -> Vec2 {
        if self.stagger_x {
            let mut py = y as f32 * (self.tileheight + self.sidelength_y);
            if self.do_stagger_x(x) {
                py += self.rowheight;
            }
            vec2(x as f32 * self.columnwidth, py)
        } else {
            let mut px = x as f32 * (self.tilewidth + self.sidelength_x);
            if self.do_stagger_y(y) {
                px += self.columnwidth;
            }
            vec2(px, y as f32 * self.rowheight)
        }
    }

    /// Emit a tile whose bounding box starts at `pos`, bottom aligned.
    pub(super) fn draw_at(&self, surface: &mut dyn TileSurface, pos: Vec2, tile: &TileRef, tileset: &Tileset) {
        blit(
            surface,
            tileset,
            tile,
            pos.x,
            pos.y + self.tileheight - tileset.tileheight as f32,
        );
    }

    /// Shared draw loop; `start` is the tile under the top-left corner of `rect`.
    pub(super) fn draw_layer_from(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect, start: IVec2) {
        let mut start_tile = start;
        let start_pos = self.tile_origin(start_tile.x, start_tile.y);

        // in which half of the tile does the top-left corner of rect fall?
        if rect.y - start_pos.y < self.sideoffset_y {
            start_tile.y -= 1;
        }
        if rect.x - start_pos.x < self.sideoffset_x {
            start_tile.x -= 1;
        }

        let end_x = layer.cols() as i32;
        let end_y = layer.rows() as i32;
        let right = rect.x + rect.w;
        let bottom = rect.y + rect.h;
        let step_x = self.tilewidth + self.sidelength_x;

        start_tile = start_tile.max(IVec2::ZERO);
        // each pass starts on an unshifted column, shifted ones sit half a row lower
        if self.do_stagger_x(start_tile.x) {
            start_tile.x -= 1;
        }
        let mut start_pos = self.tile_origin(start_tile.x, start_tile.y);
        let tilesets = layer.tilesets();

        let draw_cell = |surface: &mut dyn TileSurface, x: i32, y: i32, pos: Vec2| {
            if let Some(tile) = layer.cell_at(x, y, true) {
                self.draw_at(surface, pos, tile, tilesets.get_tileset_by_index(tile.tileset_index()));
            }
        };

        if self.stagger_x {
            let mut staggered_row = self.do_stagger_x(start_tile.x);

            while start_pos.y < bottom && start_tile.y < end_y {
                let mut row_tile = start_tile;
                let mut row_pos = start_pos;
                while row_pos.x < right && row_tile.x < end_x {
                    draw_cell(surface, row_tile.x, row_tile.y, row_pos);
                    row_pos.x += step_x;
                    row_tile.x += 2;
                }

                if staggered_row {
                    start_tile.x -= 1;
                    start_tile.y += 1;
                    start_pos.x -= self.columnwidth;
                } else {
                    start_tile.x += 1;
                    start_pos.x += self.columnwidth;
                }
                staggered_row = !staggered_row;
                start_pos.y += self.rowheight;
            }
        } else {
            // row shifting happens inside the loop
            if self.do_stagger_y(start_tile.y) {
                start_pos.x -= self.columnwidth;
            }

            while start_pos.y < bottom && start_tile.y < end_y {
                let mut row_tile = start_tile;
                let mut row_pos = start_pos;
                if self.do_stagger_y(start_tile.y) {
                    row_pos.x += self.columnwidth;
                }
                while row_pos.x < right && row_tile.x < end_x {
                    draw_cell(surface, row_tile.x, row_tile.y, row_pos);
                    row_pos.x += step_x;
                    row_tile.x += 1;
                }
                start_tile.y += 1;
                start_pos.y += self.rowheight;
            }
        }
    }
}

impl TileRenderer for HexagonalRenderer {
    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn tile_size(&self) -> (u32, u32) {
        self.tile_size
    }

    fn bounds(&self) -> Rect {
        let (cols, rows) = (self.cols as f32, self.rows as f32);
        if self.stagger_x {
            let w = cols * self.columnwidth + self.sideoffset_x;
            let mut h = rows * (self.tileheight + self.sidelength_y);
            if w > 1.0 {
                h += self.rowheight;
            }
            Rect::new(0.0, 0.0, w, h)
        } else {
            let mut w = cols * (self.tilewidth + self.sidelength_x);
            let h = rows * self.rowheight + self.sideoffset_y;
            if h > 1.0 {
                w += self.columnwidth;
            }
            Rect::new(0.0, 0.0, w, h)
        }
    }

    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2 {
        let (mut x, mut y) = (x, y);
        if self.stagger_x {
            x -= if self.stagger_even { self.tilewidth } else { self.sideoffset_x };
        } else {
            y -= if self.stagger_even { self.tileheight } else { self.sideoffset_y };
        }

        // grid-aligned reference tile and the position inside its base square
        let mut reference = ivec2(
            (x / (self.columnwidth * 2.0)).floor() as i32,
            (y / (self.rowheight * 2.0)).floor() as i32,
        );
        let rel = vec2(
            x - reference.x as f32 * self.columnwidth * 2.0,
            y - reference.y as f32 * self.rowheight * 2.0,
        );

        if self.stagger_x {
            reference.x = reference.x * 2 + i32::from(self.stagger_even);
        } else {
            reference.y = reference.y * 2 + i32::from(self.stagger_even);
        }

        // the base square overlaps several hexagons: pick the nearest centre
        let centers = if self.stagger_x {
            let left = self.sidelength_x / 2.0;
            let cx = left + self.columnwidth;
            let cy = self.tileheight / 2.0;
            [
                vec2(left, cy),
                vec2(cx, cy - self.rowheight),
                vec2(cx, cy + self.rowheight),
                vec2(cx + self.columnwidth, cy),
            ]
        } else {
            let top = self.sidelength_y / 2.0;
            let cx = self.tilewidth / 2.0;
            let cy = top + self.rowheight;
            [
                vec2(cx, top),
                vec2(cx - self.columnwidth, cy),
                vec2(cx + self.columnwidth, cy),
                vec2(cx, cy + self.rowheight),
            ]
        };

        let mut nearest = 0;
        let mut min_dist = f32::MAX;
        for (i, c) in centers.iter().enumerate() {
            let d = (*c - rel).length_squared();
            if d < min_dist {
                min_dist = d;
                nearest = i;
            }
        }

        let offsets = if self.stagger_x { &OFFSETS_STAGGER_X } else { &OFFSETS_STAGGER_Y };
        (reference + offsets[nearest]).as_vec2()
    }

    /// Centre of the tile's bounding box.
    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2 {
        self.tile_origin(x.floor() as i32, y.floor() as i32) + vec2(self.tilewidth, self.tileheight) / 2.0
    }

    fn tile_anchor(&self, x: i32, y: i32) -> Vec2 {
        self.tile_origin(x, y)
    }

    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset) {
        self.draw_at(surface, self.tile_origin(x, y), tile, tileset);
    }

    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect) {
        self.draw_layer_from(surface, layer, rect, self.tile_at(rect.x, rect.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(cols: u32, rows: u32, tw: u32, th: u32, side: u32, axis: StaggerAxis, index: StaggerIndex) -> HexagonalRenderer {
        HexagonalRenderer::new(&MapGeometry {
            orientation: Orientation::Hexagonal,
            cols,
            rows,
            tilewidth: tw,
            tileheight: th,
            hexsidelength: side,
            stagger_axis: axis,
            stagger_index: index,
        })
    }

    #[test]
    fn pointy_top_odd_rows() {
        let r = hex(4, 4, 32, 34, 8, StaggerAxis::Y, StaggerIndex::Odd);
        assert_eq!(r.tile_anchor(0, 1), vec2(16.0, 21.0));
        let p = r.tile_to_pixel_coords(0.0, 1.0);
        assert_eq!(p, vec2(32.0, 38.0));
        assert_eq!(r.pixel_to_tile_coords(p.x, p.y), vec2(0.0, 1.0));
        assert_eq!(r.bounds(), Rect::new(0.0, 0.0, 144.0, 97.0));
    }

    #[test]
    fn pixel_tile_round_trip() {
        let configs = [(32, 34, 8), (32, 32, 16), (64, 32, 0), (30, 40, 10)];
        for (tw, th, side) in configs {
            for axis in [StaggerAxis::X, StaggerAxis::Y] {
                for index in [StaggerIndex::Odd, StaggerIndex::Even] {
                    let r = hex(6, 6, tw, th, side, axis, index);
                    for c in 0..6 {
                        for row in 0..6 {
                            let p = r.tile_to_pixel_coords(c as f32, row as f32);
                            let t = r.pixel_to_tile_coords(p.x, p.y);
                            assert_eq!(t, vec2(c as f32, row as f32), "{tw}x{th}/{side} {axis:?} {index:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn neighbours_follow_stagger_parity() {
        let r = hex(4, 4, 32, 32, 16, StaggerAxis::Y, StaggerIndex::Odd);
        // odd row shifted right
        assert_eq!(r.top_left(1, 1), ivec2(1, 0));
        assert_eq!(r.bottom_right(1, 1), ivec2(2, 2));
        // even row not shifted
        assert_eq!(r.top_left(1, 2), ivec2(0, 1));
        assert_eq!(r.top_right(1, 2), ivec2(1, 1));
        assert!(r.do_stagger_y(1));
        assert!(!r.do_stagger_x(1));
    }
}
