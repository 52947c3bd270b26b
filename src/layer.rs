//! Tile, image and color layers.
use crate::color::parse_hex_color;
use crate::error::{MapError, Result};
use crate::loader::decode::decode;
use crate::loader::json_loader::JsonLayer;
use crate::properties::{properties_from_json, Properties};
use crate::render::{
    Orientation, OffscreenSurface, RenderOrder, Renderer, SurfaceFactory, TileRenderer, TileSurface,
};
use crate::tile::TileRef;
use crate::tileset::TilesetGroup;
use macroquad::color::{Color, WHITE};
use macroquad::math::{vec2, Rect, Vec2};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Map-wide values every layer is built against.
pub(crate) struct ParseContext<'a> {
    pub tilewidth: u32,
    pub tileheight: u32,
    pub orientation: Orientation,
    pub render_order: RenderOrder,
    pub tilesets: &'a Rc<TilesetGroup>,
    pub renderer: &'a Rc<Renderer>,
    pub pre_render: bool,
}

/// `visible × opacity`, clamped; invisible layers are fully transparent.
pub(crate) fn effective_opacity(visible: bool, opacity: f32) -> f32 {
    if visible {
        opacity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub(crate) fn parse_tint(tint: Option<&str>) -> Result<Option<Color>> {
    tint.map(parse_hex_color).transpose()
}

/// A grid of tiles.
///
/// Cells are stored column-major, so `cell_at(x, y)` is `grid[x * rows + y]`.
pub struct TileLayer {
    pub name: String,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub orientation: Orientation,
    pub opacity: f32,
    pub tint: Option<Color>,
    pub offset: Vec2,
    pub z: i32,
    /// Pixel size of the layer ("real" size)
    pub width: f32,
    pub height: f32,
    pub properties: Properties,
    /// Draw from an offscreen cache instead of tile by tile
    pub pre_render: bool,
    cols: u32,
    rows: u32,
    render_order: RenderOrder,
    max_tile_size: Vec2,
    grid: Vec<Option<TileRef>>,
    is_animated: bool,
    animated_tilesets: Vec<usize>,
    tilesets: Rc<TilesetGroup>,
    renderer: Rc<Renderer>,
    cache: RefCell<Option<Box<dyn OffscreenSurface>>>,
}

impl fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileLayer")
            .field("name", &self.name)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("z", &self.z)
            .field("pre_render", &self.pre_render)
            .field("is_animated", &self.is_animated)
            .finish_non_exhaustive()
    }
}

impl TileLayer {
    pub(crate) fn from_json(json: &JsonLayer, ctx: &ParseContext<'_>, z: i32) -> Result<Self> {
        let tilewidth = json.tilewidth.unwrap_or(ctx.tilewidth);
        let tileheight = json.tileheight.unwrap_or(ctx.tileheight);
        let (cols, rows) = (json.width, json.height);

        let (width, height) = match ctx.orientation {
            Orientation::Isometric => {
                let n = (cols + rows) as f32;
                (n * tilewidth as f32 / 2.0, n * tileheight as f32 / 2.0)
            }
            _ => ((cols * tilewidth) as f32, (rows * tileheight) as f32),
        };

        let max_tile_size = ctx.tilesets.iter().fold(Vec2::ZERO, |acc, ts| {
            acc.max(vec2(ts.tilewidth as f32, ts.tileheight as f32))
        });

        let properties = properties_from_json(&json.properties, json.propertytypes.as_ref())?;
        let pre_render = properties.get_bool("preRender").unwrap_or(ctx.pre_render);

        let gids = match &json.data {
            Some(data) => decode(data, json.encoding.as_deref(), json.compression.as_deref())?,
            None => Vec::new(),
        };
        let expected = cols as usize * rows as usize;
        if gids.len() < expected {
            return Err(MapError::InvalidLayerSize {
                layer: json.name.clone(),
                expected,
                actual: gids.len(),
            });
        }

        let mut grid = vec![None; expected];
        let mut gids = gids.into_iter();
        for y in 0..rows {
            for x in 0..cols {
                let gid = gids.next().unwrap_or(0);
                if gid != 0 {
                    grid[(x * rows + y) as usize] = Some(ctx.tilesets.tile_ref(x, y, gid)?);
                }
            }
        }

        debug!(layer = %json.name, cols, rows, z, "tile layer parsed");

        Ok(TileLayer {
            name: json.name.clone(),
            tilewidth,
            tileheight,
            orientation: ctx.orientation,
            opacity: effective_opacity(json.visible, json.opacity),
            tint: parse_tint(json.tintcolor.as_deref())?,
            offset: vec2(json.offsetx, json.offsety),
            z,
            width,
            height,
            properties,
            pre_render,
            cols,
            rows,
            render_order: ctx.render_order,
            max_tile_size,
            grid,
            is_animated: false,
            animated_tilesets: Vec::new(),
            tilesets: Rc::clone(ctx.tilesets),
            renderer: Rc::clone(ctx.renderer),
            cache: RefCell::new(None),
        })
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn render_order(&self) -> RenderOrder {
        self.render_order
    }

    /// Largest tile of any tileset of the map; used to widen culling ranges.
    pub fn max_tile_size(&self) -> Vec2 {
        self.max_tile_size
    }

    pub fn tilesets(&self) -> &TilesetGroup {
        &self.tilesets
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// True once activated with at least one animated tileset referenced.
    pub fn is_animated(&self) -> bool {
        self.is_animated
    }

    pub fn has_cache(&self) -> bool {
        self.cache.borrow().is_some()
    }

    /// Tile at grid position `(x, y)`.
    ///
    /// With `bounds_check == false` the caller guarantees `x < cols` and `y < rows`.
    pub fn cell_at(&self, x: i32, y: i32, bounds_check: bool) -> Option<&TileRef> {
        if bounds_check && !(x >= 0 && y >= 0 && (x as u32) < self.cols && (y as u32) < self.rows) {
            return None;
        }
        let idx = x as usize * self.rows as usize + y as usize;
        self.grid.get(idx).and_then(Option::as_ref)
    }

    /// Tile under the pixel `(x, y)`, in layer coordinates.
    pub fn get_tile(&self, x: f32, y: f32) -> Option<&TileRef> {
        let bounds = self.pixel_bounds();
        if !bounds.contains(vec2(x, y)) {
            return None;
        }
        let cell = self.renderer.tile_at(x, y);
        self.cell_at(cell.x, cell.y, true)
    }

    /// Flip-free gid of the tile under the pixel `(x, y)`.
    pub fn get_tile_id(&self, x: f32, y: f32) -> Option<u32> {
        self.get_tile(x, y).map(TileRef::tile_id)
    }

    /// Place `gid` at grid position `(x, y)`, redrawing the cache if there is one.
    pub fn set_tile(&mut self, x: u32, y: u32, gid: u32) -> Result<TileRef> {
        let idx = self.index(x, y)?;
        let tile = self.tilesets.tile_ref(x, y, gid)?;
        self.grid[idx] = Some(tile);

        let rect = self.cell_rect(x, y);
        if let Some(cache) = self.cache.get_mut() {
            let tileset = self.tilesets.get_tileset_by_index(tile.tileset_index());
            cache.clear_rect(rect);
            self.renderer.draw_tile(cache.as_tile_surface(), x as i32, y as i32, &tile, tileset);
        }
        Ok(tile)
    }

    /// Empty the cell at `(x, y)`, erasing it from the cache if there is one.
    pub fn clear_tile(&mut self, x: u32, y: u32) -> Result<()> {
        let idx = self.index(x, y)?;
        self.grid[idx] = None;
        let rect = self.cell_rect(x, y);
        if let Some(cache) = self.cache.get_mut() {
            cache.clear_rect(rect);
        }
        Ok(())
    }

    /// Prepare the layer for drawing once it joins the scene.
    ///
    /// Layers referencing an animated tileset are never pre-rendered.
    pub fn activate(&mut self, factory: Option<&mut (dyn SurfaceFactory + '_)>) {
        let mut animated: Vec<usize> = self
            .grid
            .iter()
            .flatten()
            .map(TileRef::tileset_index)
            .filter(|&i| self.tilesets.get_tileset_by_index(i).is_animated())
            .collect();
        animated.sort_unstable();
        animated.dedup();

        self.is_animated = !animated.is_empty();
        self.animated_tilesets = animated;
        if self.is_animated {
            self.pre_render = false;
        }

        if self.pre_render && self.cache.get_mut().is_none() {
            if let Some(factory) = factory {
                let size = self.pixel_bounds();
                let mut cache = factory.create(size.w.ceil() as u32, size.h.ceil() as u32);
                self.draw_all(cache.as_tile_surface());
                debug!(layer = %self.name, w = size.w, h = size.h, "pre-render cache built");
                *self.cache.get_mut() = Some(cache);
            }
        }
    }

    pub fn deactivate(&mut self) {
        self.animated_tilesets.clear();
    }

    /// Advance the animations of the tilesets this layer uses.
    ///
    /// Returns whether any displayed tile changed.
    pub fn update(&self, dt: f32, tick: u64) -> bool {
        if !self.is_animated {
            return false;
        }
        let mut changed = false;
        for &i in &self.animated_tilesets {
            changed |= self.tilesets.get_tileset_by_index(i).update(dt, tick);
        }
        changed
    }

    /// Draw the part of the layer inside `rect`.
    pub fn draw(&self, surface: &mut dyn TileSurface, rect: Rect) {
        let mut tint = self.tint.unwrap_or(WHITE);
        tint.a *= self.opacity;
        surface.set_tint(tint);

        match self.cache.borrow_mut().as_mut() {
            Some(cache) => {
                // the cache ends at the layer's edge
                let w = rect.w.min((self.width - rect.x).max(0.0));
                let h = rect.h.min((self.height - rect.y).max(0.0));
                cache.present(surface, Rect::new(rect.x, rect.y, w, h), vec2(rect.x, rect.y), tint);
            }
            None => self.renderer.draw_tile_layer(surface, self, rect),
        }

        surface.set_tint(WHITE);
    }

    fn draw_all(&self, surface: &mut dyn TileSurface) {
        for tile in self.grid.iter().flatten() {
            let tileset = self.tilesets.get_tileset_by_index(tile.tileset_index());
            self.renderer.draw_tile(surface, tile.x as i32, tile.y as i32, tile, tileset);
        }
    }

    fn pixel_bounds(&self) -> Rect {
        let map = self.renderer.bounds();
        Rect::new(0.0, 0.0, self.width.max(map.w), self.height.max(map.h))
    }

    fn index(&self, x: u32, y: u32) -> Result<usize> {
        if x >= self.cols || y >= self.rows {
            return Err(MapError::OutOfBounds {
                x: x.into(),
                y: y.into(),
            });
        }
        Ok((x * self.rows + y) as usize)
    }

    fn cell_rect(&self, x: u32, y: u32) -> Rect {
        let p = self.renderer.tile_anchor(x as i32, y as i32);
        trace!(layer = %self.name, x, y, "cache cell invalidated");
        let max = self.max_tile_size;
        // oversized tiles grow upwards from the cell's bottom edge
        let top = p.y + self.tileheight as f32 - max.y;
        Rect::new(p.x, top, max.x.max(self.tilewidth as f32), max.y.max(self.tileheight as f32))
    }
}

/// A single image drawn at an offset.
#[derive(Debug, Clone)]
pub struct ImageLayer {
    pub name: String,
    pub image: String,
    pub offset: Vec2,
    /// Parallax scroll ratio
    pub ratio: Vec2,
    pub repeat_x: bool,
    pub repeat_y: bool,
    pub tint: Option<Color>,
    pub opacity: f32,
    pub z: i32,
    pub properties: Properties,
}

impl ImageLayer {
    pub(crate) fn from_json(json: &JsonLayer, z: i32) -> Result<Self> {
        let image = json
            .image
            .clone()
            .ok_or_else(|| MapError::InvalidMap(format!("image layer '{}' has no image", json.name)))?;
        debug!(layer = %json.name, %image, z, "image layer parsed");
        Ok(ImageLayer {
            name: json.name.clone(),
            image,
            offset: vec2(json.offsetx, json.offsety),
            ratio: vec2(json.parallaxx, json.parallaxy),
            repeat_x: json.repeatx,
            repeat_y: json.repeaty,
            tint: parse_tint(json.tintcolor.as_deref())?,
            opacity: effective_opacity(json.visible, json.opacity),
            z,
            properties: properties_from_json(&json.properties, json.propertytypes.as_ref())?,
        })
    }

    /// Full-opacity image at the origin, as used for the map's `background_image`.
    pub fn background(image: impl Into<String>, z: i32) -> Self {
        ImageLayer {
            name: "background_image".to_owned(),
            image: image.into(),
            offset: Vec2::ZERO,
            ratio: Vec2::ONE,
            repeat_x: false,
            repeat_y: false,
            tint: None,
            opacity: 1.0,
            z,
            properties: Properties::new(),
        }
    }

    pub fn draw(&self, surface: &mut dyn TileSurface) {
        let mut tint = self.tint.unwrap_or(WHITE);
        tint.a *= self.opacity;
        surface.draw_image(&self.image, self.offset, tint);
    }
}

/// Flat background fill.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLayer {
    pub name: String,
    pub color: Color,
    pub z: i32,
}

impl ColorLayer {
    pub fn new(name: impl Into<String>, color: Color, z: i32) -> Self {
        ColorLayer {
            name: name.into(),
            color,
            z,
        }
    }

    pub fn draw(&self, surface: &mut dyn TileSurface, rect: Rect) {
        surface.fill_rect(rect, self.color);
    }
}

#[derive(Debug)]
pub enum MapLayer {
    Tiles(TileLayer),
    Image(ImageLayer),
    Color(ColorLayer),
}

impl MapLayer {
    pub fn name(&self) -> &str {
        match self {
            MapLayer::Tiles(l) => &l.name,
            MapLayer::Image(l) => &l.name,
            MapLayer::Color(l) => &l.name,
        }
    }

    pub fn z(&self) -> i32 {
        match self {
            MapLayer::Tiles(l) => l.z,
            MapLayer::Image(l) => l.z,
            MapLayer::Color(l) => l.z,
        }
    }

    pub fn as_tiles(&self) -> Option<&TileLayer> {
        match self {
            MapLayer::Tiles(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_tiles_mut(&mut self) -> Option<&mut TileLayer> {
        match self {
            MapLayer::Tiles(l) => Some(l),
            _ => None,
        }
    }

    pub fn update(&self, dt: f32, tick: u64) -> bool {
        match self {
            MapLayer::Tiles(l) => l.update(dt, tick),
            _ => false,
        }
    }

    pub fn draw(&self, surface: &mut dyn TileSurface, rect: Rect) {
        match self {
            MapLayer::Tiles(l) => l.draw(surface, rect),
            MapLayer::Image(l) => l.draw(surface),
            MapLayer::Color(l) => l.draw(surface, rect),
        }
    }
}
