use super::{HexagonalRenderer, MapGeometry, Orientation, TileRenderer, TileSurface};
use crate::layer::TileLayer;
use crate::object::MapObject;
use crate::tile::TileRef;
use crate::tileset::Tileset;
use macroquad::math::{ivec2, vec2, IVec2, Rect, Vec2};
use std::f32::consts::{FRAC_PI_4, SQRT_2};

/// Staggered isometric renderer: hexagonal geometry with zero-length sides.
#[derive(Debug, Clone)]
pub struct StaggeredRenderer {
    hex: HexagonalRenderer,
}

impl StaggeredRenderer {
    pub fn new(geometry: &MapGeometry) -> Self {
        StaggeredRenderer {
            hex: HexagonalRenderer::new(&MapGeometry {
                orientation: Orientation::Staggered,
                hexsidelength: 0,
                ..*geometry
            }),
        }
    }

    /// The underlying stagger geometry and neighbour helpers.
    pub fn hex(&self) -> &HexagonalRenderer {
        &self.hex
    }
}

impl TileRenderer for StaggeredRenderer {
    fn orientation(&self) -> Orientation {
        Orientation::Staggered
    }

    fn tile_size(&self) -> (u32, u32) {
        self.hex.tile_size()
    }

    fn bounds(&self) -> Rect {
        self.hex.bounds()
    }

    /// Fractional diamond coordinates, measured from tile centres.
    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2 {
        let h = &self.hex;
        let (tw, th) = (h.tilewidth, h.tileheight);
        let reference = self.tile_at(x, y);

        // undo the diamond projection around the centre of the reference tile
        let centre = h.tile_origin(reference.x, reference.y) + vec2(tw, th) / 2.0;
        let local = vec2(x - centre.x, (y - centre.y) * (tw / th)) / (tw / SQRT_2);
        let (sin, cos) = (-FRAC_PI_4).sin_cos();
        let unrotated = vec2(local.x * cos - local.y * sin, local.x * sin + local.y * cos);

        unrotated + reference.as_vec2()
    }

    /// Centre of the tile's diamond.
    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2 {
        self.hex.tile_to_pixel_coords(x, y)
    }

    fn tile_at(&self, x: f32, y: f32) -> IVec2 {
        let h = &self.hex;
        let (tw, th) = (h.tilewidth, h.tileheight);

        let mut aligned = vec2(x, y);
        if h.stagger_x {
            aligned.x -= if h.stagger_even { h.sideoffset_x } else { 0.0 };
        } else {
            aligned.y -= if h.stagger_even { h.sideoffset_y } else { 0.0 };
        }

        let mut reference = ivec2((aligned.x / tw).floor() as i32, (aligned.y / th).floor() as i32);
        let rel = vec2(aligned.x - reference.x as f32 * tw, aligned.y - reference.y as f32 * th);

        if h.stagger_x {
            reference.x = reference.x * 2 + i32::from(h.stagger_even);
        } else {
            reference.y = reference.y * 2 + i32::from(h.stagger_even);
        }

        // corners of the base square belong to the neighbouring tiles
        let y_pos = rel.x * (th / tw);
        if h.sideoffset_y - y_pos > rel.y {
            reference = h.top_left(reference.x, reference.y);
        }
        if -h.sideoffset_y + y_pos > rel.y {
            reference = h.top_right(reference.x, reference.y);
        }
        if h.sideoffset_y + y_pos < rel.y {
            reference = h.bottom_left(reference.x, reference.y);
        }
        if h.sideoffset_y * 3.0 - y_pos < rel.y {
            reference = h.bottom_right(reference.x, reference.y);
        }
        reference
    }

    fn tile_anchor(&self, x: i32, y: i32) -> Vec2 {
        self.hex.tile_origin(x, y)
    }

    fn adjust_position(&self, obj: &mut MapObject) {
        self.hex.adjust_position(obj)
    }

    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset) {
        self.hex.draw_tile(surface, x, y, tile, tileset)
    }

    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect) {
        self.hex.draw_layer_from(surface, layer, rect, self.tile_at(rect.x, rect.y));
    }
}
