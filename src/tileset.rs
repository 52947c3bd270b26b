use crate::error::{MapError, Result};
use crate::geom::Shape;
use crate::loader::json_loader::{JsonTile, JsonTileset};
use crate::object;
use crate::properties::{properties_from_json, Properties};
use crate::render::DrawCommand;
use crate::tile::{clean_gid, TileRef};
use macroquad::math::{vec2, Rect, Vec2};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One frame of a tile animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    /// Local tile id shown during this frame
    pub tile_id: u32,
    /// Milliseconds
    pub duration: f32,
}

/// Playback state of one animated tile.
#[derive(Debug, Clone)]
pub struct TileAnimation {
    frames: Vec<AnimationFrame>,
    idx: usize,
    elapsed: f32,
}

impl TileAnimation {
    fn new(frames: Vec<AnimationFrame>) -> Self {
        TileAnimation {
            frames,
            idx: 0,
            elapsed: 0.0,
        }
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn current(&self) -> AnimationFrame {
        self.frames[self.idx]
    }

    /// Advance by `dt` ms, carrying the remainder into the next frame.
    fn advance(&mut self, dt: f32) -> bool {
        let mut changed = false;
        self.elapsed += dt;
        let mut duration = self.current().duration;
        while self.elapsed >= duration {
            self.elapsed -= duration;
            self.idx = (self.idx + 1) % self.frames.len();
            duration = self.current().duration;
            changed = true;
        }
        changed
    }
}

/// Image of a single tile in an image collection tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// One tileset of a map, owning the gid range `firstgid..=lastgid`.
#[derive(Debug)]
pub struct Tileset {
    /// Position inside the map's [`TilesetGroup`]
    pub index: usize,
    pub name: String,
    pub firstgid: u32,
    pub lastgid: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub spacing: u32,
    pub margin: u32,
    pub columns: u32,
    /// Atlas image, relative to the map directory
    pub image: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    pub tileoffset: Vec2,
    /// Tiles come from individual images instead of one atlas
    pub is_collection: bool,
    pub properties: Properties,
    tile_images: HashMap<u32, TileImage>,
    tile_properties: HashMap<u32, Properties>,
    collision: HashMap<u32, Vec<Shape>>,
    animations: RefCell<HashMap<u32, TileAnimation>>,
    last_tick: Cell<Option<u64>>,
}

impl Tileset {
    pub(crate) fn from_json(index: usize, json: &JsonTileset) -> Result<Self> {
        if json.tilewidth == 0 || json.tileheight == 0 {
            return Err(MapError::InvalidMap(format!(
                "tileset '{}' has a zero tile size",
                json.name
            )));
        }

        let firstgid = json.firstgid;
        let mut tile_images = HashMap::new();
        let mut tile_properties = HashMap::new();
        let mut collision = HashMap::new();
        let mut animations = HashMap::new();

        for tile in &json.tiles {
            read_tile(
                json,
                tile,
                &mut tile_images,
                &mut tile_properties,
                &mut collision,
                &mut animations,
            )?;
        }

        let is_collection = !tile_images.is_empty();
        let spacing = json.spacing;
        let columns = if json.columns > 0 {
            json.columns
        } else if json.imagewidth > 0 {
            ((json.imagewidth as f32) / json.tilewidth.saturating_add(spacing) as f32).round() as u32
        } else {
            0
        };
        let image_rows = || ((json.imageheight as f32) / json.tileheight.saturating_add(spacing) as f32).round() as u32;
        let overflow = || MapError::InvalidMap(format!("tileset '{}' gid range overflows", json.name));

        let lastgid = match json.tilecount {
            Some(count) if count > 0 => {
                if !is_collection && columns > 0 && json.imageheight > 0 {
                    let computed = columns.checked_mul(image_rows());
                    if computed != Some(count) {
                        warn!(
                            tileset = %json.name,
                            computed = ?computed,
                            tilecount = count,
                            "computed tilecount does not match the declared one"
                        );
                    }
                }
                firstgid.checked_add(count - 1).ok_or_else(overflow)?
            }
            _ if !is_collection && columns > 0 && json.imageheight > 0 => {
                let count = columns.checked_mul(image_rows()).ok_or_else(overflow)?;
                firstgid.checked_add(count.saturating_sub(1)).ok_or_else(overflow)?
            }
            _ => firstgid,
        };

        let properties = properties_from_json(&json.properties, json.propertytypes.as_ref())?;
        let tileoffset = json.tileoffset.map(|o| vec2(o.x, o.y)).unwrap_or(Vec2::ZERO);

        debug!(
            name = %json.name,
            firstgid,
            lastgid,
            animated = !animations.is_empty(),
            "tileset added"
        );

        Ok(Tileset {
            index,
            name: json.name.clone(),
            firstgid,
            lastgid,
            tilewidth: json.tilewidth,
            tileheight: json.tileheight,
            spacing,
            margin: json.margin,
            columns,
            image: json.image.clone(),
            image_width: json.imagewidth,
            image_height: json.imageheight,
            tileoffset,
            is_collection,
            properties,
            tile_images,
            tile_properties,
            collision,
            animations: RefCell::new(animations),
            last_tick: Cell::new(None),
        })
    }

    /// `firstgid <= gid <= lastgid`, flip flags ignored.
    #[inline]
    pub fn contains(&self, gid: u32) -> bool {
        let gid = clean_gid(gid);
        gid >= self.firstgid && gid <= self.lastgid
    }

    /// Single-id tileset used for logical tiles without a real image.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.firstgid == self.lastgid
    }

    pub fn is_animated(&self) -> bool {
        !self.animations.borrow().is_empty()
    }

    pub fn tile_size(&self) -> Vec2 {
        vec2(self.tilewidth as f32, self.tileheight as f32)
    }

    /// Local tile id currently displayed for `local_id` (its animation frame, if any).
    pub fn view_tile_id(&self, local_id: u32) -> u32 {
        self.animations
            .borrow()
            .get(&local_id)
            .map(|anim| anim.current().tile_id)
            .unwrap_or(local_id)
    }

    /// Animation attached to a local tile id.
    pub fn animation(&self, local_id: u32) -> Option<TileAnimation> {
        self.animations.borrow().get(&local_id).cloned()
    }

    /// Atlas rectangle of a local tile id, honouring margin and spacing.
    pub fn source_rect(&self, local_id: u32) -> Rect {
        if let Some(img) = self.tile_images.get(&local_id) {
            return Rect::new(0.0, 0.0, img.width as f32, img.height as f32);
        }
        let cols = self.columns.max(1);
        let col = local_id % cols;
        let row = local_id / cols;
        let sx = self.margin + col * (self.tilewidth + self.spacing);
        let sy = self.margin + row * (self.tileheight + self.spacing);
        Rect::new(sx as f32, sy as f32, self.tilewidth as f32, self.tileheight as f32)
    }

    pub fn tile_image(&self, local_id: u32) -> Option<&TileImage> {
        self.tile_images.get(&local_id)
    }

    pub fn tile_images(&self) -> impl Iterator<Item = (u32, &TileImage)> {
        self.tile_images.iter().map(|(id, img)| (*id, img))
    }

    /// User properties of the tile with global id `gid`.
    pub fn tile_properties(&self, gid: u32) -> Option<&Properties> {
        let gid = clean_gid(gid);
        if gid < self.firstgid {
            return None;
        }
        self.tile_properties.get(&(gid - self.firstgid))
    }

    /// Collision shapes authored on a tile, in tile-local pixels.
    pub fn collision_shapes(&self, local_id: u32) -> &[Shape] {
        self.collision.get(&local_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Advance every tile animation by `dt` ms, at most once per `tick`.
    ///
    /// Returns whether any displayed frame changed.
    pub fn update(&self, dt: f32, tick: u64) -> bool {
        if self.last_tick.get() == Some(tick) {
            return false;
        }
        self.last_tick.set(Some(tick));

        let mut changed = false;
        for anim in self.animations.borrow_mut().values_mut() {
            changed |= anim.advance(dt);
        }
        changed
    }

    /// Build the draw command for `tile` with its top-left corner at `(dx, dy)`.
    pub fn draw_command(&self, tile: &TileRef, dx: f32, dy: f32) -> DrawCommand {
        let local = tile.local_id();
        let (tile_id, size) = match self.tile_images.get(&local) {
            Some(img) => (local, vec2(img.width as f32, img.height as f32)),
            None => (self.view_tile_id(local), self.tile_size()),
        };
        DrawCommand {
            tileset_index: self.index,
            tile_id,
            src: self.source_rect(tile_id),
            dest: vec2(dx, dy),
            size,
            flip_x: tile.flipped_x(),
            flip_y: tile.flipped_y(),
            flip_d: tile.flipped_ad(),
        }
    }
}

fn read_tile(
    json: &JsonTileset,
    tile: &JsonTile,
    images: &mut HashMap<u32, TileImage>,
    props: &mut HashMap<u32, Properties>,
    collision: &mut HashMap<u32, Vec<Shape>>,
    animations: &mut HashMap<u32, TileAnimation>,
) -> Result<()> {
    if let Some(path) = &tile.image {
        let width = if tile.imagewidth > 0 { tile.imagewidth } else { json.tilewidth };
        let height = if tile.imageheight > 0 { tile.imageheight } else { json.tileheight };
        images.insert(
            tile.id,
            TileImage {
                path: path.clone(),
                width,
                height,
            },
        );
    }

    let p = properties_from_json(&tile.properties, None)?;
    if !p.is_empty() {
        props.insert(tile.id, p);
    }

    if let Some(group) = &tile.objectgroup {
        let shapes = object::template_shapes(&group.objects)?;
        if !shapes.is_empty() {
            collision.insert(tile.id, shapes);
        }
    }

    if !tile.animation.is_empty() {
        let frames: Vec<AnimationFrame> = tile
            .animation
            .iter()
            .map(|f| AnimationFrame {
                tile_id: f.tileid,
                duration: f.duration as f32,
            })
            .collect();
        if frames.iter().all(|f| f.duration <= 0.0) {
            warn!(tileset = %json.name, tile = tile.id, "animation without duration ignored");
        } else {
            animations.insert(tile.id, TileAnimation::new(frames));
        }
    }

    Ok(())
}

/// Insertion-ordered tilesets of one map, resolving gids to their owner.
#[derive(Debug, Default)]
pub struct TilesetGroup {
    tilesets: Vec<Tileset>,
}

impl TilesetGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tileset; its `index` is rewritten to its position in the group.
    pub fn add(&mut self, mut tileset: Tileset) {
        tileset.index = self.tilesets.len();
        self.tilesets.push(tileset);
    }

    pub fn len(&self) -> usize {
        self.tilesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }

    /// Positional lookup; panics when out of range.
    pub fn get_tileset_by_index(&self, index: usize) -> &Tileset {
        &self.tilesets[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tileset> {
        self.tilesets.iter()
    }

    /// Resolve the tileset owning `gid`.
    ///
    /// Flip flags are ignored. An exact range match wins; otherwise the last
    /// placeholder tileset with `firstgid <= gid` is used.
    pub fn get_tileset_by_gid(&self, gid: u32) -> Result<&Tileset> {
        let gid = clean_gid(gid);
        let mut fallback = None;

        for tileset in &self.tilesets {
            if tileset.contains(gid) {
                return Ok(tileset);
            }
            if tileset.is_placeholder() && gid >= tileset.firstgid {
                fallback = Some(tileset);
            }
        }

        fallback.ok_or(MapError::Lookup { gid })
    }

    /// Build a [`TileRef`] for `gid` placed at `(x, y)`.
    pub fn tile_ref(&self, x: u32, y: u32, gid: u32) -> Result<TileRef> {
        let tileset = self.get_tileset_by_gid(gid)?;
        Ok(TileRef::new(x, y, gid, tileset.index, tileset.firstgid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{FLIP_H, FLIP_V};

    fn tileset(json: &str) -> Tileset {
        let json: JsonTileset = serde_json::from_str(json).expect("valid json");
        Tileset::from_json(0, &json).expect("tileset")
    }

    fn group() -> TilesetGroup {
        let mut g = TilesetGroup::new();
        g.add(tileset(r#"{"firstgid":1,"tilewidth":32,"tileheight":32,"tilecount":4,"columns":2}"#));
        g.add(tileset(r#"{"firstgid":5,"tilewidth":32,"tileheight":32,"tilecount":4,"columns":2}"#));
        // placeholder: a single id without an image
        g.add(tileset(r#"{"firstgid":20,"tilewidth":32,"tileheight":32}"#));
        g
    }

    #[test]
    fn lastgid_from_tilecount_or_image_grid() {
        let ts = tileset(r#"{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":6,"columns":3}"#);
        assert_eq!(ts.lastgid, 6);

        let ts = tileset(
            r#"{"firstgid":10,"tilewidth":16,"tileheight":16,"imagewidth":64,"imageheight":32,"image":"a.png"}"#,
        );
        assert_eq!(ts.columns, 4);
        assert_eq!(ts.lastgid, 17);

        let ts = tileset(r#"{"firstgid":3,"tilewidth":16,"tileheight":16}"#);
        assert!(ts.is_placeholder());
    }

    #[test]
    fn gid_ranges_past_u32_are_rejected() {
        let load = |json: &str| {
            let json: JsonTileset = serde_json::from_str(json).expect("valid json");
            Tileset::from_json(0, &json)
        };
        let err = load(r#"{"firstgid":4294967290,"name":"big","tilewidth":16,"tileheight":16,"tilecount":10}"#).unwrap_err();
        assert!(matches!(err, MapError::InvalidMap(msg) if msg.contains("'big'")));

        let grid = r#"{"firstgid":1,"tilewidth":1,"tileheight":1,"columns":70000,"imageheight":70000,"image":"a.png"}"#;
        assert!(matches!(load(grid), Err(MapError::InvalidMap(_))));

        // the last representable gid is still fine
        let ts = load(r#"{"firstgid":4294967286,"tilewidth":16,"tileheight":16,"tilecount":10}"#).unwrap();
        assert_eq!(ts.lastgid, u32::MAX);
    }

    #[test]
    fn gid_lookup_prefers_exact_then_placeholder() {
        let g = group();
        assert_eq!(g.get_tileset_by_gid(1).unwrap().index, 0);
        assert_eq!(g.get_tileset_by_gid(4).unwrap().index, 0);
        assert_eq!(g.get_tileset_by_gid(5).unwrap().index, 1);
        assert_eq!(g.get_tileset_by_gid(20).unwrap().index, 2);
        // beyond every range: placeholder fallback
        assert_eq!(g.get_tileset_by_gid(25).unwrap().index, 2);
        // gap before the placeholder: nothing matches
        assert!(matches!(g.get_tileset_by_gid(12), Err(MapError::Lookup { gid: 12 })));
    }

    #[test]
    fn gid_lookup_ignores_flip_flags() {
        let g = group();
        for gid in 1..=8u32 {
            let plain = g.get_tileset_by_gid(gid).unwrap().index;
            let flipped = g.get_tileset_by_gid(gid | FLIP_H | FLIP_V).unwrap().index;
            assert_eq!(plain, flipped);
            // repeated lookups are stable
            assert_eq!(plain, g.get_tileset_by_gid(gid).unwrap().index);
        }
    }

    #[test]
    fn last_placeholder_wins() {
        let mut g = TilesetGroup::new();
        g.add(tileset(r#"{"firstgid":1,"tilewidth":8,"tileheight":8}"#));
        g.add(tileset(r#"{"firstgid":2,"tilewidth":8,"tileheight":8}"#));
        assert_eq!(g.get_tileset_by_gid(9).unwrap().index, 1);
    }

    #[test]
    fn source_rect_uses_margin_and_spacing() {
        let ts = tileset(
            r#"{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":8,"columns":4,"margin":1,"spacing":2}"#,
        );
        assert_eq!(ts.source_rect(0), Rect::new(1.0, 1.0, 16.0, 16.0));
        assert_eq!(ts.source_rect(5), Rect::new(19.0, 19.0, 16.0, 16.0));
    }

    #[test]
    fn animation_advances_once_per_tick() {
        let ts = tileset(
            r#"{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":4,"columns":4,
                "tiles":[{"id":0,"animation":[{"tileid":0,"duration":100},{"tileid":1,"duration":50},{"tileid":2,"duration":100}]}]}"#,
        );
        assert!(ts.is_animated());
        assert_eq!(ts.view_tile_id(0), 0);

        assert!(!ts.update(60.0, 1));
        assert!(ts.update(60.0, 2));
        assert_eq!(ts.view_tile_id(0), 1);
        // same tick again: no double advance
        assert!(!ts.update(500.0, 2));
        assert_eq!(ts.view_tile_id(0), 1);
        // 20ms carried over + 40ms = frame 2 after 50ms
        assert!(ts.update(40.0, 3));
        assert_eq!(ts.view_tile_id(0), 2);
        // non animated tiles are unaffected
        assert_eq!(ts.view_tile_id(3), 3);
    }

    #[test]
    fn zero_duration_animation_is_ignored() {
        let ts = tileset(
            r#"{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":2,"columns":2,
                "tiles":[{"id":0,"animation":[{"tileid":0,"duration":0},{"tileid":1,"duration":0}]}]}"#,
        );
        assert!(!ts.is_animated());
        assert!(!ts.update(16.0, 1));
    }

    #[test]
    fn collections_and_tile_properties() {
        let ts = tileset(
            r#"{"firstgid":7,"tilewidth":32,"tileheight":32,"tilecount":2,"columns":0,
                "tiles":[
                  {"id":0,"image":"tree.png","imagewidth":48,"imageheight":64,
                   "properties":[{"name":"solid","type":"bool","value":true}]},
                  {"id":1,"image":"rock.png","imagewidth":16,"imageheight":16}
                ]}"#,
        );
        assert!(ts.is_collection);
        assert_eq!(ts.lastgid, 8);
        assert_eq!(ts.tile_image(0).map(|i| i.path.as_str()), Some("tree.png"));
        assert_eq!(ts.source_rect(0), Rect::new(0.0, 0.0, 48.0, 64.0));
        assert_eq!(ts.tile_properties(7).and_then(|p| p.get_bool("solid")), Some(true));
        assert!(ts.tile_properties(8).is_none());
    }

    #[test]
    fn collision_templates_are_kept_per_tile() {
        let ts = tileset(
            r#"{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":1,"columns":1,
                "tiles":[{"id":0,"objectgroup":{"objects":[{"x":2,"y":4,"width":12,"height":8}]}}]}"#,
        );
        let shapes = ts.collision_shapes(0);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].bounds(), Rect::new(2.0, 4.0, 12.0, 8.0));
        assert!(ts.collision_shapes(1).is_empty());
    }
}
