use super::{blit, MapGeometry, Orientation, TileRenderer, TileSurface};
use crate::layer::TileLayer;
use crate::object::MapObject;
use crate::tile::TileRef;
use crate::tileset::Tileset;
use macroquad::math::{vec2, Rect, Vec2};

/// Diamond projection; tile `(0, 0)` sits at the top, `origin_x` pixels from the left.
#[derive(Debug, Clone)]
pub struct IsometricRenderer {
    cols: u32,
    rows: u32,
    tilewidth: u32,
    tileheight: u32,
    h_tilewidth: f32,
    h_tileheight: f32,
    origin_x: f32,
}

impl IsometricRenderer {
    pub fn new(geometry: &MapGeometry) -> Self {
        let h_tilewidth = geometry.tilewidth as f32 / 2.0;
        IsometricRenderer {
            cols: geometry.cols,
            rows: geometry.rows,
            tilewidth: geometry.tilewidth,
            tileheight: geometry.tileheight,
            h_tilewidth,
            h_tileheight: geometry.tileheight as f32 / 2.0,
            origin_x: geometry.rows as f32 * h_tilewidth,
        }
    }
}

impl TileRenderer for IsometricRenderer {
    fn orientation(&self) -> Orientation {
        Orientation::Isometric
    }

    fn tile_size(&self) -> (u32, u32) {
        (self.tilewidth, self.tileheight)
    }

    fn bounds(&self) -> Rect {
        let n = (self.cols + self.rows) as f32;
        Rect::new(0.0, 0.0, n * self.h_tilewidth, n * self.h_tileheight)
    }

    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2 {
        let ty = y / self.tileheight as f32;
        let tx = (x - self.origin_x) / self.tilewidth as f32;
        vec2(ty + tx, ty - tx)
    }

    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2 {
        vec2(
            (x - y) * self.h_tilewidth + self.origin_x,
            (x + y) * self.h_tileheight,
        )
    }

    /// Tiled stores isometric object positions in projected tile units where
    /// both axes are measured in `tileheight` pixels.
    fn adjust_position(&self, obj: &mut MapObject) {
        let th = self.tileheight as f32;
        let pos = self.tile_to_pixel_coords(obj.x / th, obj.y / th);
        obj.x = pos.x;
        obj.y = pos.y;
    }

    fn tile_anchor(&self, x: i32, y: i32) -> Vec2 {
        let p = self.tile_to_pixel_coords(x as f32, y as f32);
        vec2(p.x - self.h_tilewidth, p.y)
    }

    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset) {
        let p = self.tile_anchor(x, y);
        blit(
            surface,
            tileset,
            tile,
            p.x,
            p.y + self.tileheight as f32 - tileset.tileheight as f32,
        );
    }

    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect) {
        let max = layer.max_tile_size();
        let tw = self.tilewidth as f32;
        let th = self.tileheight as f32;

        let first = self.pixel_to_tile_coords(rect.x - max.x, rect.y - max.y).floor();
        let last = self
            .pixel_to_tile_coords(rect.x + rect.w + max.x, rect.y + rect.h + max.y)
            .ceil();
        let rect_end = self.tile_to_pixel_coords(last.x, last.y);

        let (mut row_x, mut row_y) = (first.x as i32, first.y as i32);
        let mut start = self.tile_to_pixel_coords(first.x, first.y);
        start.x -= self.h_tilewidth;
        start.y += th;

        // is the top-left corner in the upper or the left half of its tile?
        let in_upper_half = start.y - rect.y > self.h_tileheight;
        let in_left_half = rect.x - start.x < self.h_tilewidth;

        if in_upper_half {
            if in_left_half {
                row_x -= 1;
                start.x -= self.h_tilewidth;
            } else {
                row_y -= 1;
                start.x += self.h_tilewidth;
            }
            start.y -= self.h_tileheight;
        }

        // whether the current row is shifted half a tile to the right
        let mut shifted = in_upper_half ^ in_left_half;
        let tilesets = layer.tilesets();

        let mut y = start.y * 2.0;
        while y - th * 2.0 < rect_end.y * 2.0 {
            let (mut col_x, mut col_y) = (row_x, row_y);
            let mut x = start.x;
            while x < rect_end.x {
                if let Some(tile) = layer.cell_at(col_x, col_y, true) {
                    let tileset = tilesets.get_tileset_by_index(tile.tileset_index());
                    blit(surface, tileset, tile, x, y / 2.0 - tileset.tileheight as f32);
                }
                col_x += 1;
                col_y -= 1;
                x += tw;
            }

            if shifted {
                row_y += 1;
                start.x -= self.h_tilewidth;
            } else {
                row_x += 1;
                start.x += self.h_tilewidth;
            }
            shifted = !shifted;
            y += th;
        }
    }
}
