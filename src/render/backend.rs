//! macroquad implementation of the drawing surfaces.
use super::{DrawCommand, OffscreenSurface, SurfaceFactory, TileSurface};
use crate::error::{MapError, Result};
use crate::map::TileMap;
use macroquad::prelude::*;
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use tracing::debug;

async fn load_tex(path: &Path) -> Result<Texture2D> {
    let tex = load_texture(&path.to_string_lossy())
        .await
        .map_err(|e| MapError::Texture {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    tex.set_filter(FilterMode::Nearest);
    Ok(tex)
}

/// Draws tiles and layer images straight to the current macroquad camera.
#[derive(Clone)]
pub struct MacroquadSurface {
    atlases: Vec<Option<Texture2D>>,
    tile_images: HashMap<(usize, u32), Texture2D>,
    images: HashMap<String, Texture2D>,
    tint: Color,
}

impl MacroquadSurface {
    /// Load every texture the map refers to: tileset atlases, collection
    /// tile images and image layers.
    pub async fn load(map: &mut TileMap) -> Result<Self> {
        let base = map.base_dir().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);

        let mut atlases = Vec::new();
        let mut tile_images = HashMap::new();
        for ts in map.tilesets()?.iter() {
            let atlas = match &ts.image {
                Some(image) => Some(load_tex(&base.join(image)).await?),
                None => None,
            };
            atlases.push(atlas);
            for (id, img) in ts.tile_images() {
                tile_images.insert((ts.index, id), load_tex(&base.join(&img.path)).await?);
            }
        }

        let paths: Vec<String> = map.image_layers()?.iter().map(|l| l.image.clone()).collect();
        let mut images = HashMap::new();
        for path in paths {
            if !images.contains_key(&path) {
                let tex = load_tex(&base.join(&path)).await?;
                images.insert(path, tex);
            }
        }

        debug!(
            map = %map.name,
            atlases = atlases.len(),
            tile_images = tile_images.len(),
            images = images.len(),
            "textures loaded"
        );
        Ok(MacroquadSurface {
            atlases,
            tile_images,
            images,
            tint: WHITE,
        })
    }
}

impl TileSurface for MacroquadSurface {
    fn draw_tile(&mut self, cmd: &DrawCommand) {
        let (texture, source) = match self.tile_images.get(&(cmd.tileset_index, cmd.tile_id)) {
            Some(tex) => (tex, None),
            None => match self.atlases.get(cmd.tileset_index).and_then(Option::as_ref) {
                Some(tex) => (tex, Some(cmd.src)),
                // placeholder tilesets have nothing to draw
                None => return,
            },
        };

        // anti-diagonal flip: a quarter turn, then mirror
        let (rotation, flip_x, flip_y) = if cmd.flip_d {
            (FRAC_PI_2, cmd.flip_y, !cmd.flip_x)
        } else {
            (0.0, cmd.flip_x, cmd.flip_y)
        };

        draw_texture_ex(
            texture,
            cmd.dest.x,
            cmd.dest.y,
            self.tint,
            DrawTextureParams {
                dest_size: Some(cmd.size),
                source,
                rotation,
                flip_x,
                flip_y,
                ..Default::default()
            },
        );
    }

    fn set_tint(&mut self, tint: Color) {
        self.tint = tint;
    }

    fn draw_image(&mut self, image: &str, dest: Vec2, tint: Color) {
        if let Some(tex) = self.images.get(image) {
            draw_texture(tex, dest.x, dest.y, tint);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        draw_rectangle(rect.x, rect.y, rect.w, rect.h, color);
    }
}

impl SurfaceFactory for MacroquadSurface {
    fn create(&mut self, width: u32, height: u32) -> Box<dyn OffscreenSurface> {
        Box::new(MacroquadCache::new(self.clone(), width, height))
    }
}

/// Pre-rendered layer backed by a render target.
///
/// Tiles are recorded and rasterized on the next `present` after a change.
pub struct MacroquadCache {
    painter: MacroquadSurface,
    target: RenderTarget,
    size: Vec2,
    commands: Vec<DrawCommand>,
    dirty: bool,
}

impl MacroquadCache {
    pub fn new(mut painter: MacroquadSurface, width: u32, height: u32) -> Self {
        let target = render_target(width.max(1), height.max(1));
        target.texture.set_filter(FilterMode::Nearest);
        painter.tint = WHITE;
        MacroquadCache {
            painter,
            target,
            size: vec2(width as f32, height as f32),
            commands: Vec::new(),
            dirty: true,
        }
    }

    fn rasterize(&mut self) {
        push_camera_state();
        let mut camera = Camera2D::from_display_rect(Rect::new(0.0, 0.0, self.size.x, self.size.y));
        camera.render_target = Some(self.target.clone());
        set_camera(&camera);
        clear_background(BLANK);
        for cmd in &self.commands {
            self.painter.draw_tile(cmd);
        }
        pop_camera_state();
        self.dirty = false;
    }
}

impl TileSurface for MacroquadCache {
    fn draw_tile(&mut self, cmd: &DrawCommand) {
        self.commands.push(*cmd);
        self.dirty = true;
    }
}

impl OffscreenSurface for MacroquadCache {
    fn as_tile_surface(&mut self) -> &mut dyn TileSurface {
        self
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.commands.retain(|cmd| !rect.contains(cmd.dest_rect().center()));
        self.dirty = true;
    }

    /// Draws onto the current macroquad camera; `_target` only fixes the draw order.
    fn present(&mut self, _target: &mut dyn TileSurface, src: Rect, dest: Vec2, tint: Color) {
        if self.dirty {
            self.rasterize();
        }
        // render targets come out upside down
        let source = Rect::new(src.x, self.size.y - src.y - src.h, src.w, src.h);
        draw_texture_ex(
            &self.target.texture,
            dest.x,
            dest.y,
            tint,
            DrawTextureParams {
                dest_size: Some(vec2(src.w, src.h)),
                source: Some(source),
                flip_y: true,
                ..Default::default()
            },
        );
    }
}
