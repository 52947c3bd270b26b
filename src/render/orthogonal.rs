use super::{blit, MapGeometry, Orientation, RenderOrder, TileRenderer, TileSurface};
use crate::layer::TileLayer;
use crate::tile::TileRef;
use crate::tileset::Tileset;
use macroquad::math::{vec2, Rect, Vec2};

#[derive(Debug, Clone)]
pub struct OrthogonalRenderer {
    cols: u32,
    rows: u32,
    tilewidth: u32,
    tileheight: u32,
}

impl OrthogonalRenderer {
    pub fn new(geometry: &MapGeometry) -> Self {
        OrthogonalRenderer {
            cols: geometry.cols,
            rows: geometry.rows,
            tilewidth: geometry.tilewidth,
            tileheight: geometry.tileheight,
        }
    }

    fn tw(&self) -> f32 {
        self.tilewidth as f32
    }

    fn th(&self) -> f32 {
        self.tileheight as f32
    }
}

impl TileRenderer for OrthogonalRenderer {
    fn orientation(&self) -> Orientation {
        Orientation::Orthogonal
    }

    fn tile_size(&self) -> (u32, u32) {
        (self.tilewidth, self.tileheight)
    }

    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.cols as f32 * self.tw(), self.rows as f32 * self.th())
    }

    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2 {
        vec2(x / self.tw(), y / self.th())
    }

    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2 {
        vec2(x * self.tw(), y * self.th())
    }

    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset) {
        // bottom aligned: taller tiles grow upwards
        blit(
            surface,
            tileset,
            tile,
            x as f32 * self.tw(),
            (y + 1) as f32 * self.th() - tileset.tileheight as f32,
        );
    }

    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect) {
        let max = layer.max_tile_size();
        let start = self
            .pixel_to_tile_coords(
                (rect.x - (max.x - layer.tilewidth as f32)).max(0.0),
                (rect.y - (max.y - layer.tileheight as f32)).max(0.0),
            )
            .floor();
        let end = self
            .pixel_to_tile_coords(rect.x + rect.w + self.tw(), rect.y + rect.h + self.th())
            .ceil();

        let end_x = (end.x.max(0.0) as i32).min(layer.cols() as i32);
        let end_y = (end.y.max(0.0) as i32).min(layer.rows() as i32);
        let start_x = (start.x as i32).min(end_x);
        let start_y = (start.y as i32).min(end_y);

        let xs: Vec<i32> = match layer.render_order() {
            RenderOrder::LeftDown | RenderOrder::LeftUp => (start_x..end_x).rev().collect(),
            _ => (start_x..end_x).collect(),
        };
        let ys: Vec<i32> = match layer.render_order() {
            RenderOrder::RightUp | RenderOrder::LeftUp => (start_y..end_y).rev().collect(),
            _ => (start_y..end_y).collect(),
        };

        let tilesets = layer.tilesets();
        for &y in &ys {
            for &x in &xs {
                if let Some(tile) = layer.cell_at(x, y, false) {
                    self.draw_tile(surface, x, y, tile, tilesets.get_tileset_by_index(tile.tileset_index()));
                }
            }
        }
    }
}
