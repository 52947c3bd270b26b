//! Drawing collaborators: everything the renderers emit goes through these traits.
use macroquad::color::Color;
use macroquad::math::{Rect, Vec2};

/// One tile blit, fully resolved: atlas rectangle, destination and flip flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub tileset_index: usize,
    /// Local id of the displayed tile (animation frame applied)
    pub tile_id: u32,
    /// Atlas rectangle; for image collections, the whole tile image
    pub src: Rect,
    /// Top-left destination in layer pixels
    pub dest: Vec2,
    pub size: Vec2,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip_d: bool,
}

impl DrawCommand {
    /// Destination rectangle.
    pub fn dest_rect(&self) -> Rect {
        Rect::new(self.dest.x, self.dest.y, self.size.x, self.size.y)
    }
}

/// A target tiles and layer images are drawn onto.
pub trait TileSurface {
    fn draw_tile(&mut self, cmd: &DrawCommand);

    /// Color (alpha included) applied to the draws that follow.
    fn set_tint(&mut self, _tint: Color) {}

    /// Draw a layer image with its top-left corner at `dest`.
    fn draw_image(&mut self, _image: &str, _dest: Vec2, _tint: Color) {}

    /// Fill a rectangle with a flat color.
    fn fill_rect(&mut self, _rect: Rect, _color: Color) {}
}

/// Offscreen raster used as a pre-rendered layer cache.
pub trait OffscreenSurface: TileSurface {
    /// The cache as a plain draw target; implementations return `self`.
    fn as_tile_surface(&mut self) -> &mut dyn TileSurface;

    /// Erase a region (a tile being cleared or replaced).
    fn clear_rect(&mut self, rect: Rect);

    /// Copy `src` of the cache onto `target` at `dest`, modulated by `tint`.
    fn present(&mut self, target: &mut dyn TileSurface, src: Rect, dest: Vec2, tint: Color);
}

/// Creates offscreen surfaces sized to a layer.
pub trait SurfaceFactory {
    fn create(&mut self, width: u32, height: u32) -> Box<dyn OffscreenSurface>;
}
