//! Map geometry and the four tile renderers.
//!
//! A renderer converts between pixel and tile space for one map orientation and
//! walks a [`TileLayer`] in draw order for a visible rectangle, emitting
//! [`DrawCommand`]s onto a [`TileSurface`].

mod backend;
mod hexagonal;
mod isometric;
mod orthogonal;
mod staggered;
mod surface;

pub use backend::{MacroquadCache, MacroquadSurface};
pub use hexagonal::HexagonalRenderer;
pub use isometric::IsometricRenderer;
pub use orthogonal::OrthogonalRenderer;
pub use staggered::StaggeredRenderer;
pub use surface::{DrawCommand, OffscreenSurface, SurfaceFactory, TileSurface};

use crate::error::MapError;
use crate::layer::TileLayer;
use crate::object::MapObject;
use crate::tile::TileRef;
use crate::tileset::Tileset;
use macroquad::math::{IVec2, Rect, Vec2};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Orthogonal,
    Isometric,
    Hexagonal,
    Staggered,
}

impl FromStr for Orientation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            "hexagonal" => Ok(Orientation::Hexagonal),
            "staggered" => Ok(Orientation::Staggered),
            other => Err(MapError::UnsupportedOrientation(other.to_owned())),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Orthogonal => "orthogonal",
            Orientation::Isometric => "isometric",
            Orientation::Hexagonal => "hexagonal",
            Orientation::Staggered => "staggered",
        })
    }
}

/// Order in which an orthogonal layer's tiles are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderOrder {
    #[default]
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

impl FromStr for RenderOrder {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "right-down" => Ok(RenderOrder::RightDown),
            "right-up" => Ok(RenderOrder::RightUp),
            "left-down" => Ok(RenderOrder::LeftDown),
            "left-up" => Ok(RenderOrder::LeftUp),
            other => Err(MapError::InvalidMap(format!("unknown render order '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaggerAxis {
    X,
    #[default]
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaggerIndex {
    Even,
    #[default]
    Odd,
}

/// Everything a renderer is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapGeometry {
    pub orientation: Orientation,
    pub cols: u32,
    pub rows: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub hexsidelength: u32,
    pub stagger_axis: StaggerAxis,
    pub stagger_index: StaggerIndex,
}

impl MapGeometry {
    /// Plain orthogonal geometry.
    pub fn orthogonal(cols: u32, rows: u32, tilewidth: u32, tileheight: u32) -> Self {
        MapGeometry {
            orientation: Orientation::Orthogonal,
            cols,
            rows,
            tilewidth,
            tileheight,
            hexsidelength: 0,
            stagger_axis: StaggerAxis::default(),
            stagger_index: StaggerIndex::default(),
        }
    }
}

/// Shared contract of the four renderers.
pub trait TileRenderer {
    fn orientation(&self) -> Orientation;

    /// Tile size the renderer was built for, before any rounding.
    fn tile_size(&self) -> (u32, u32);

    /// True when this renderer fits the given orientation and tile size.
    ///
    /// Grid dimensions are deliberately ignored: layers of one map may differ.
    fn can_render(&self, orientation: Orientation, tilewidth: u32, tileheight: u32) -> bool {
        self.orientation() == orientation && self.tile_size() == (tilewidth, tileheight)
    }

    /// Pixel bounds of the whole map.
    fn bounds(&self) -> Rect;

    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2;

    /// Pixel position of tile `(x, y)`; `pixel_to_tile_coords` maps it back to `(x, y)`.
    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2;

    /// Grid cell under the pixel `(x, y)`.
    fn tile_at(&self, x: f32, y: f32) -> IVec2 {
        self.pixel_to_tile_coords(x, y).floor().as_ivec2()
    }

    /// Top-left corner of the tile's bounding box, where its image is anchored.
    fn tile_anchor(&self, x: i32, y: i32) -> Vec2 {
        self.tile_to_pixel_coords(x as f32, y as f32)
    }

    /// Move a tile object's anchor from the bottom-left to the top-left.
    fn adjust_position(&self, obj: &mut MapObject) {
        if obj.gid.is_some() {
            obj.y -= obj.height;
        }
    }

    /// Draw one tile at grid position `(x, y)`.
    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset);

    /// Draw every tile of `layer` that may overlap `rect`, in draw order.
    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect);
}

/// The active renderer of a map.
#[derive(Debug, Clone)]
pub enum Renderer {
    Orthogonal(OrthogonalRenderer),
    Isometric(IsometricRenderer),
    Hexagonal(HexagonalRenderer),
    Staggered(StaggeredRenderer),
}

impl Renderer {
    pub fn new(geometry: &MapGeometry) -> Self {
        match geometry.orientation {
            Orientation::Orthogonal => Renderer::Orthogonal(OrthogonalRenderer::new(geometry)),
            Orientation::Isometric => Renderer::Isometric(IsometricRenderer::new(geometry)),
            Orientation::Hexagonal => Renderer::Hexagonal(HexagonalRenderer::new(geometry)),
            Orientation::Staggered => Renderer::Staggered(StaggeredRenderer::new(geometry)),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $r:ident => $body:expr) => {
        match $self {
            Renderer::Orthogonal($r) => $body,
            Renderer::Isometric($r) => $body,
            Renderer::Hexagonal($r) => $body,
            Renderer::Staggered($r) => $body,
        }
    };
}

impl TileRenderer for Renderer {
    fn orientation(&self) -> Orientation {
        dispatch!(self, r => r.orientation())
    }

    fn tile_size(&self) -> (u32, u32) {
        dispatch!(self, r => r.tile_size())
    }

    fn bounds(&self) -> Rect {
        dispatch!(self, r => r.bounds())
    }

    fn pixel_to_tile_coords(&self, x: f32, y: f32) -> Vec2 {
        dispatch!(self, r => r.pixel_to_tile_coords(x, y))
    }

    fn tile_to_pixel_coords(&self, x: f32, y: f32) -> Vec2 {
        dispatch!(self, r => r.tile_to_pixel_coords(x, y))
    }

    fn tile_at(&self, x: f32, y: f32) -> IVec2 {
        dispatch!(self, r => r.tile_at(x, y))
    }

    fn tile_anchor(&self, x: i32, y: i32) -> Vec2 {
        dispatch!(self, r => r.tile_anchor(x, y))
    }

    fn adjust_position(&self, obj: &mut MapObject) {
        dispatch!(self, r => r.adjust_position(obj))
    }

    fn draw_tile(&self, surface: &mut dyn TileSurface, x: i32, y: i32, tile: &TileRef, tileset: &Tileset) {
        dispatch!(self, r => r.draw_tile(surface, x, y, tile, tileset))
    }

    fn draw_tile_layer(&self, surface: &mut dyn TileSurface, layer: &TileLayer, rect: Rect) {
        dispatch!(self, r => r.draw_tile_layer(surface, layer, rect))
    }
}

/// Emit the draw command of `tile` at pixel position `(dx, dy)`, tileset offset applied.
pub(crate) fn blit(surface: &mut dyn TileSurface, tileset: &Tileset, tile: &TileRef, dx: f32, dy: f32) {
    let cmd = tileset.draw_command(tile, dx + tileset.tileoffset.x, dy + tileset.tileoffset.y);
    surface.draw_tile(&cmd);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use macroquad::color::Color;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every draw call in order.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub tiles: Vec<DrawCommand>,
    }

    impl TileSurface for RecordingSurface {
        fn draw_tile(&mut self, cmd: &DrawCommand) {
            self.tiles.push(*cmd);
        }
    }

    /// Everything the caches of one [`RecordingFactory`] were asked to do.
    #[derive(Default)]
    pub struct CacheLog {
        pub drawn: Vec<DrawCommand>,
        pub cleared: Vec<Rect>,
        /// `(src, dest, tint)` of each present call.
        pub presented: Vec<(Rect, Vec2, Color)>,
    }

    pub struct RecordingCache {
        log: Rc<RefCell<CacheLog>>,
    }

    impl TileSurface for RecordingCache {
        fn draw_tile(&mut self, cmd: &DrawCommand) {
            self.log.borrow_mut().drawn.push(*cmd);
        }
    }

    impl OffscreenSurface for RecordingCache {
        fn as_tile_surface(&mut self) -> &mut dyn TileSurface {
            self
        }

        fn clear_rect(&mut self, rect: Rect) {
            self.log.borrow_mut().cleared.push(rect);
        }

        fn present(&mut self, _target: &mut dyn TileSurface, src: Rect, dest: Vec2, tint: Color) {
            self.log.borrow_mut().presented.push((src, dest, tint));
        }
    }

    #[derive(Default)]
    pub struct RecordingFactory {
        pub created: usize,
        pub log: Rc<RefCell<CacheLog>>,
    }

    impl SurfaceFactory for RecordingFactory {
        fn create(&mut self, _width: u32, _height: u32) -> Box<dyn OffscreenSurface> {
            self.created += 1;
            Box::new(RecordingCache {
                log: Rc::clone(&self.log),
            })
        }
    }
}
