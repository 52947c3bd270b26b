use crate::color::parse_hex_color;
use crate::error::{MapError, Result};
use crate::layer::{ColorLayer, ImageLayer, MapLayer, ParseContext, TileLayer};
use crate::loader::json_loader::{
    parse_map_str, read_map_file, resolve_tileset, version_older_than, version_string, JsonMap,
};
use crate::object::{GroupChild, ObjectGroup};
use crate::properties::{properties_from_json, Properties};
use crate::render::{
    MapGeometry, Orientation, RenderOrder, Renderer, StaggerAxis, StaggerIndex, SurfaceFactory,
    TileRenderer,
};
use crate::scene::{Container, GroupContainer, MapEntity, PlacedObject, Viewport, ViewportFit};
use crate::tileset::{Tileset, TilesetGroup};
use macroquad::color::Color;
use macroquad::math::Rect;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Load-time settings of a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Pre-render tile layers into an offscreen cache unless a layer's
    /// `preRender` property says otherwise.
    pub pre_render: bool,
}

/// Hands out z-orders shared by every kind of layer, in declaration order.
#[derive(Debug, Default)]
struct ZOrder(i32);

impl ZOrder {
    fn next(&mut self) -> i32 {
        let z = self.0;
        self.0 += 1;
        z
    }
}

enum MapContent {
    Unparsed,
    Parsed {
        tilesets: Rc<TilesetGroup>,
        layers: Vec<MapLayer>,
        groups: Vec<ObjectGroup>,
    },
}

/// A Tiled map.
///
/// Metadata is read on construction; tilesets, layers and objects are parsed on
/// first access to [`get_layers`](Self::get_layers) or [`get_objects`](Self::get_objects).
pub struct TileMap {
    pub name: String,
    pub cols: u32,
    pub rows: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    pub orientation: Orientation,
    pub render_order: RenderOrder,
    pub hexsidelength: u32,
    pub stagger_axis: StaggerAxis,
    pub stagger_index: StaggerIndex,
    pub background_color: Option<Color>,
    /// From the `background_image` map property
    pub background_image: Option<String>,
    pub version: Option<String>,
    pub tiled_version: Option<String>,
    pub class: Option<String>,
    pub next_object_id: u32,
    pub properties: Properties,
    /// Pixel bounds, computed by the renderer at construction
    pub bounds: Rect,
    options: MapOptions,
    base_dir: Option<PathBuf>,
    data: JsonMap,
    renderer: Option<Rc<Renderer>>,
    content: MapContent,
}

impl std::fmt::Debug for TileMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileMap")
            .field("name", &self.name)
            .field("orientation", &self.orientation)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("parsed", &self.is_parsed())
            .finish_non_exhaustive()
    }
}

impl TileMap {
    /// Load a `.json` / `.tmj` map; external tilesets resolve next to it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (data, base_dir) = read_map_file(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, data, Some(base_dir))
    }

    /// Parse a map held in memory. It cannot reference external tilesets.
    pub fn from_json_str(name: impl Into<String>, text: &str) -> Result<Self> {
        Self::new(name.into(), parse_map_str(text)?, None)
    }

    /// Replace the load options; they apply to the next parse.
    pub fn with_options(mut self, options: MapOptions) -> Self {
        self.options = options;
        self
    }

    fn new(name: String, data: JsonMap, base_dir: Option<PathBuf>) -> Result<Self> {
        if data.infinite {
            return Err(MapError::InfiniteMap);
        }
        let orientation: Orientation = data.orientation.parse()?;
        let render_order: RenderOrder = data.renderorder.parse()?;
        let stagger_axis = match data.staggeraxis.as_deref() {
            Some("x") => StaggerAxis::X,
            Some("y") | None => StaggerAxis::Y,
            Some(other) => return Err(MapError::InvalidMap(format!("unknown stagger axis '{other}'"))),
        };
        let stagger_index = match data.staggerindex.as_deref() {
            Some("even") => StaggerIndex::Even,
            Some("odd") | None => StaggerIndex::Odd,
            Some(other) => return Err(MapError::InvalidMap(format!("unknown stagger index '{other}'"))),
        };
        let background_color = data.backgroundcolor.as_deref().map(parse_hex_color).transpose()?;
        let properties = properties_from_json(&data.properties, data.propertytypes.as_ref())?;
        let background_image = properties.get_string("background_image").map(str::to_owned);

        let version = version_string(data.version.as_ref());
        if let Some(v) = &version {
            if version_older_than(v, "1.5") {
                warn!(map = %name, version = %v, "Tiled map format 1.4 and below is deprecated, re-save with 1.5 or higher");
            }
        }

        let mut map = TileMap {
            name,
            cols: data.width,
            rows: data.height,
            tilewidth: data.tilewidth,
            tileheight: data.tileheight,
            orientation,
            render_order,
            hexsidelength: data.hexsidelength,
            stagger_axis,
            stagger_index,
            background_color,
            background_image,
            version,
            tiled_version: data.tiledversion.clone(),
            class: data.class.clone(),
            next_object_id: data.nextobjectid,
            properties,
            bounds: Rect::default(),
            options: MapOptions::default(),
            base_dir,
            data,
            renderer: None,
            content: MapContent::Unparsed,
        };
        map.bounds = map.get_renderer().bounds();

        debug!(map = %map.name, %orientation, cols = map.cols, rows = map.rows, "map created");
        Ok(map)
    }

    pub fn options(&self) -> MapOptions {
        self.options
    }

    /// Directory the map was loaded from; image paths are relative to it.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn geometry(&self) -> MapGeometry {
        MapGeometry {
            orientation: self.orientation,
            cols: self.cols,
            rows: self.rows,
            tilewidth: self.tilewidth,
            tileheight: self.tileheight,
            hexsidelength: self.hexsidelength,
            stagger_axis: self.stagger_axis,
            stagger_index: self.stagger_index,
        }
    }

    /// The map's renderer, rebuilt when the tile size or orientation changed.
    pub fn get_renderer(&mut self) -> &Renderer {
        let renderer = self.renderer_rc();
        &**self.renderer.insert(renderer)
    }

    fn renderer_rc(&mut self) -> Rc<Renderer> {
        if let Some(r) = &self.renderer {
            if r.can_render(self.orientation, self.tilewidth, self.tileheight) {
                return Rc::clone(r);
            }
        }
        let renderer = Rc::new(Renderer::new(&self.geometry()));
        self.bounds = renderer.bounds();
        debug!(map = %self.name, orientation = %self.orientation, bounds = ?self.bounds, "renderer created");
        self.renderer = Some(Rc::clone(&renderer));
        renderer
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.content, MapContent::Parsed { .. })
    }

    /// Parse tilesets, layers and object groups. Does nothing once parsed.
    ///
    /// A failure leaves the map unparsed.
    pub fn read_map_objects(&mut self) -> Result<()> {
        if self.is_parsed() {
            return Ok(());
        }

        let mut tilesets = TilesetGroup::new();
        for (i, entry) in self.data.tilesets.iter().enumerate() {
            let json = resolve_tileset(entry, self.base_dir.as_deref())?;
            tilesets.add(Tileset::from_json(i, &json)?);
        }
        let tilesets = Rc::new(tilesets);
        let renderer = self.renderer_rc();

        let ctx = ParseContext {
            tilewidth: self.tilewidth,
            tileheight: self.tileheight,
            orientation: self.orientation,
            render_order: self.render_order,
            tilesets: &tilesets,
            renderer: &renderer,
            pre_render: self.options.pre_render,
        };

        let mut z = ZOrder::default();
        let mut layers = Vec::new();
        let mut groups = Vec::new();

        if let Some(color) = self.background_color {
            layers.push(MapLayer::Color(ColorLayer::new("background_color", color, z.next())));
        }
        if let Some(image) = &self.background_image {
            layers.push(MapLayer::Image(ImageLayer::background(image.clone(), z.next())));
        }

        for layer in &self.data.layers {
            match layer.kind.as_str() {
                "tilelayer" => layers.push(MapLayer::Tiles(TileLayer::from_json(layer, &ctx, z.next())?)),
                "imagelayer" => layers.push(MapLayer::Image(ImageLayer::from_json(layer, z.next())?)),
                "objectgroup" | "group" => groups.push(ObjectGroup::from_json(layer, &ctx, z.next())?),
                other => warn!(map = %self.name, layer = %layer.name, kind = other, "unknown layer type skipped"),
            }
        }

        debug!(
            map = %self.name,
            tilesets = tilesets.len(),
            layers = layers.len(),
            groups = groups.len(),
            "map parsed"
        );
        self.content = MapContent::Parsed {
            tilesets,
            layers,
            groups,
        };
        Ok(())
    }

    pub fn tilesets(&mut self) -> Result<&TilesetGroup> {
        self.read_map_objects()?;
        match &self.content {
            MapContent::Parsed { tilesets, .. } => Ok(tilesets),
            MapContent::Unparsed => Err(not_parsed()),
        }
    }

    /// Top-level layers in z order, synthesised background layers first.
    pub fn get_layers(&mut self) -> Result<&[MapLayer]> {
        self.read_map_objects()?;
        match &self.content {
            MapContent::Parsed { layers, .. } => Ok(layers),
            MapContent::Unparsed => Err(not_parsed()),
        }
    }

    pub fn get_layers_mut(&mut self) -> Result<&mut [MapLayer]> {
        self.read_map_objects()?;
        match &mut self.content {
            MapContent::Parsed { layers, .. } => Ok(layers),
            MapContent::Unparsed => Err(not_parsed()),
        }
    }

    pub fn object_groups(&mut self) -> Result<&[ObjectGroup]> {
        self.read_map_objects()?;
        match &self.content {
            MapContent::Parsed { groups, .. } => Ok(groups),
            MapContent::Unparsed => Err(not_parsed()),
        }
    }

    /// Objects of every object group.
    ///
    /// Flattened, each object's opacity is multiplied by its group's; otherwise
    /// every non-empty group becomes a [`GroupContainer`].
    pub fn get_objects(&mut self, flatten: bool) -> Result<Vec<MapEntity<'_>>> {
        self.read_map_objects()?;
        self.renderer_rc();
        let bounds = self.bounds;
        match &self.content {
            MapContent::Parsed { groups, .. } => Ok(collect_objects(groups, flatten, bounds)),
            MapContent::Unparsed => Err(not_parsed()),
        }
    }

    /// Image layers, nested ones included.
    pub fn image_layers(&mut self) -> Result<Vec<&ImageLayer>> {
        self.read_map_objects()?;
        let mut out = Vec::new();
        if let MapContent::Parsed { layers, groups, .. } = &self.content {
            out.extend(layers.iter().filter_map(|l| match l {
                MapLayer::Image(img) => Some(img),
                _ => None,
            }));
            for group in groups {
                collect_images(group, &mut out);
            }
        }
        Ok(out)
    }

    /// Activate every tile layer, nested ones included.
    pub fn activate_layers(&mut self, mut factory: Option<&mut (dyn SurfaceFactory + '_)>) -> Result<()> {
        self.read_map_objects()?;
        if let MapContent::Parsed { layers, groups, .. } = &mut self.content {
            for layer in layers.iter_mut().filter_map(MapLayer::as_tiles_mut) {
                layer.activate(factory.as_deref_mut());
            }
            for group in groups.iter_mut() {
                activate_group(group, &mut factory);
            }
        }
        Ok(())
    }

    /// Add every layer and object to `container`, sized to the map.
    ///
    /// With a viewport, returns the [`ViewportFit`] already applied to its
    /// current size; apply it again on every resize.
    pub fn add_to<'m>(
        &'m mut self,
        container: &mut dyn Container<'m>,
        flatten: bool,
        viewport: Option<&mut dyn Viewport>,
    ) -> Result<Option<ViewportFit>> {
        self.read_map_objects()?;
        self.renderer_rc();
        let this: &'m TileMap = self;

        if let Some(color) = this.background_color {
            container.set_background_color(color);
        }
        let MapContent::Parsed { layers, groups, .. } = &this.content else {
            return Err(not_parsed());
        };
        for layer in layers {
            container.add_child(MapEntity::Layer(layer));
        }
        for entity in collect_objects(groups, flatten, this.bounds) {
            container.add_child(entity);
        }

        container.resize(this.bounds.w, this.bounds.h);
        container.sort(true);

        Ok(viewport.map(|viewport| {
            let fit = ViewportFit::new(this.bounds.w, this.bounds.h);
            let size = viewport.size();
            fit.apply(size.x, size.y, viewport, container);
            fit
        }))
    }

    /// Drop everything parsed; the next access parses again.
    pub fn destroy(&mut self) {
        self.content = MapContent::Unparsed;
    }
}

fn not_parsed() -> MapError {
    MapError::InvalidMap("map content is not parsed".to_owned())
}

fn collect_objects(groups: &[ObjectGroup], flatten: bool, bounds: Rect) -> Vec<MapEntity<'_>> {
    let mut out = Vec::new();
    for group in groups {
        if flatten {
            flatten_group(group, group.opacity, &mut out);
        } else if let Some(container) = group_container(group, bounds) {
            out.push(MapEntity::Group(container));
        }
    }
    out
}

fn flatten_group<'m>(group: &'m ObjectGroup, opacity: f32, out: &mut Vec<MapEntity<'m>>) {
    for child in &group.children {
        match child {
            GroupChild::Object(object) => out.push(MapEntity::Object(PlacedObject {
                object,
                opacity: object.opacity * opacity,
            })),
            GroupChild::Layer(layer) => out.push(MapEntity::Layer(layer)),
            GroupChild::Group(nested) => flatten_group(nested, opacity * nested.opacity, out),
        }
    }
}

fn group_container(group: &ObjectGroup, bounds: Rect) -> Option<GroupContainer<'_>> {
    let children: Vec<MapEntity<'_>> = group
        .children
        .iter()
        .filter_map(|child| match child {
            GroupChild::Object(object) => Some(MapEntity::Object(PlacedObject {
                object,
                opacity: object.opacity,
            })),
            GroupChild::Layer(layer) => Some(MapEntity::Layer(layer)),
            GroupChild::Group(nested) => group_container(nested, bounds).map(MapEntity::Group),
        })
        .collect();

    if children.is_empty() {
        return None;
    }
    Some(GroupContainer {
        name: &group.name,
        z: group.z,
        opacity: group.opacity,
        bounds: Rect::new(0.0, 0.0, bounds.w, bounds.h),
        children,
    })
}

fn collect_images<'m>(group: &'m ObjectGroup, out: &mut Vec<&'m ImageLayer>) {
    for child in &group.children {
        match child {
            GroupChild::Layer(MapLayer::Image(img)) => out.push(img),
            GroupChild::Group(nested) => collect_images(nested, out),
            _ => {}
        }
    }
}

fn activate_group(group: &mut ObjectGroup, factory: &mut Option<&mut (dyn SurfaceFactory + '_)>) {
    for child in &mut group.children {
        match child {
            GroupChild::Layer(MapLayer::Tiles(layer)) => layer.activate(factory.as_deref_mut()),
            GroupChild::Group(nested) => activate_group(nested, factory),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::RecordingFactory;

    const MAP: &str = r##"{
        "orientation": "orthogonal", "width": 4, "height": 4, "tilewidth": 32, "tileheight": 32,
        "backgroundcolor": "#336699", "version": "1.4",
        "properties": [{ "name": "background_image", "type": "string", "value": "sky.png" }],
        "tilesets": [{ "firstgid": 1, "tilewidth": 32, "tileheight": 32, "tilecount": 4, "columns": 2,
                       "image": "tiles.png", "imagewidth": 64, "imageheight": 64 }],
        "layers": [
            { "type": "tilelayer", "name": "ground", "width": 4, "height": 4, "encoding": "csv",
              "data": "1,0,0,2,0,0,0,0,0,0,0,0,0,0,0,0" },
            { "type": "objectgroup", "name": "things", "opacity": 0.5,
              "objects": [{ "id": 1, "name": "a", "width": 8, "height": 8 }] },
            { "type": "imagelayer", "name": "clouds", "image": "clouds.png" }
        ]
    }"##;

    #[test]
    fn z_orders_are_shared_across_layer_kinds() {
        let mut map = TileMap::from_json_str("test", MAP).unwrap();
        assert!(!map.is_parsed());

        let layers: Vec<(String, i32)> = map
            .get_layers()
            .unwrap()
            .iter()
            .map(|l| (l.name().to_owned(), l.z()))
            .collect();
        assert_eq!(
            layers,
            vec![
                ("background_color".to_owned(), 0),
                ("background_image".to_owned(), 1),
                ("ground".to_owned(), 2),
                ("clouds".to_owned(), 4),
            ]
        );
        assert_eq!(map.object_groups().unwrap()[0].z, 3);
    }

    #[test]
    fn parsing_is_idempotent() {
        let mut map = TileMap::from_json_str("test", MAP).unwrap();
        let first = map.get_layers().unwrap().len();
        map.read_map_objects().unwrap();
        assert_eq!(map.get_layers().unwrap().len(), first);

        map.destroy();
        assert!(!map.is_parsed());
        assert_eq!(map.get_layers().unwrap().len(), first);
    }

    #[test]
    fn flattened_objects_take_the_group_opacity() {
        let mut map = TileMap::from_json_str("test", MAP).unwrap();
        let objects = map.get_objects(true).unwrap();
        assert_eq!(objects.len(), 1);
        let MapEntity::Object(placed) = &objects[0] else { panic!("expected an object") };
        assert_eq!(placed.opacity, 0.5);

        let nested = map.get_objects(false).unwrap();
        let MapEntity::Group(group) = &nested[0] else { panic!("expected a group") };
        assert_eq!((group.name, group.z, group.opacity), ("things", 3, 0.5));
        assert_eq!(group.bounds, Rect::new(0.0, 0.0, 128.0, 128.0));
    }

    #[test]
    fn renderer_follows_tile_size_changes() {
        let mut map = TileMap::from_json_str("test", MAP).unwrap();
        assert_eq!(map.bounds, Rect::new(0.0, 0.0, 128.0, 128.0));
        assert_eq!(map.get_renderer().tile_size(), (32, 32));

        map.tilewidth = 16;
        assert_eq!(map.get_renderer().tile_size(), (16, 32));
        assert_eq!(map.bounds, Rect::new(0.0, 0.0, 64.0, 128.0));
    }

    #[test]
    fn object_bounds_follow_tile_size_changes() {
        let mut map = TileMap::from_json_str("test", MAP).unwrap();
        map.tileheight = 8;
        let nested = map.get_objects(false).unwrap();
        let MapEntity::Group(group) = &nested[0] else { panic!("expected a group") };
        assert_eq!(group.bounds, Rect::new(0.0, 0.0, 128.0, 32.0));
    }

    #[test]
    fn activation_reaches_layers_nested_in_groups() {
        let json = r#"{
            "orientation": "orthogonal", "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
            "tilesets": [{ "firstgid": 1, "tilewidth": 16, "tileheight": 16, "tilecount": 4, "columns": 2,
                           "image": "t.png", "imagewidth": 32, "imageheight": 32 }],
            "layers": [
                { "type": "tilelayer", "name": "ground", "width": 2, "height": 2, "data": [1, 2, 3, 4] },
                { "type": "group", "name": "world", "layers": [
                    { "type": "group", "name": "deep", "layers": [
                        { "type": "tilelayer", "name": "roof", "width": 2, "height": 2, "data": [0, 1, 0, 0] }
                    ] }
                ] }
            ]
        }"#;
        let mut map = TileMap::from_json_str("nested", json)
            .unwrap()
            .with_options(MapOptions { pre_render: true });
        let mut factory = RecordingFactory::default();
        map.activate_layers(Some(&mut factory)).unwrap();

        assert_eq!(factory.created, 2);
        assert_eq!(factory.log.borrow().drawn.len(), 5);
        let GroupChild::Group(deep) = &map.object_groups().unwrap()[0].children[0] else {
            panic!("expected a nested group")
        };
        let GroupChild::Layer(MapLayer::Tiles(roof)) = &deep.children[0] else { panic!("expected a tile layer") };
        assert!(roof.has_cache());
    }

    #[test]
    fn metadata_is_kept() {
        let map = TileMap::from_json_str("test", MAP).unwrap();
        assert_eq!(map.version.as_deref(), Some("1.4"));
        assert_eq!(map.background_image.as_deref(), Some("sky.png"));
        assert_eq!(map.background_color, Some(Color::from_rgba(0x33, 0x66, 0x99, 0xff)));
        assert_eq!(map.options(), MapOptions::default());
    }

    #[test]
    fn rejects_unusable_maps() {
        let err = TileMap::from_json_str("inf", r#"{ "infinite": true, "tilewidth": 8, "tileheight": 8 }"#).unwrap_err();
        assert!(matches!(err, MapError::InfiniteMap));

        let err = TileMap::from_json_str(
            "bad",
            r#"{ "orientation": "hexagonal-invalid", "tilewidth": 8, "tileheight": 8 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MapError::UnsupportedOrientation(o) if o == "hexagonal-invalid"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: MapOptions = serde_json::from_str("{}").unwrap();
        assert!(!opts.pre_render);
        let opts: MapOptions = serde_json::from_str(r#"{ "pre_render": true }"#).unwrap();
        assert!(opts.pre_render);
    }
}
