//! Map objects, object groups and the shapes derived from them.
use crate::color::parse_hex_color;
use crate::error::{MapError, Result};
use crate::geom::{rotate_point, Ellipse, Line, Polygon, Shape};
use crate::layer::{effective_opacity, parse_tint, ImageLayer, MapLayer, ParseContext, TileLayer};
use crate::loader::json_loader::{JsonLayer, JsonObject, JsonPoint, JsonText};
use crate::properties::{properties_from_json, Properties};
use crate::render::{Orientation, TileRenderer};
use crate::tile::TileRef;
use macroquad::color::{Color, BLACK};
use macroquad::math::{vec2, Vec2};
use tracing::{debug, warn};

/// Object groups whose lowercase name contains this hold world collision geometry.
pub const COLLISION_GROUP: &str = "collision";

/// Text attached to a text object.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font: String,
    /// Pixel size
    pub size: f32,
    pub color: Color,
    pub halign: String,
    pub valign: String,
    pub wrap: bool,
    pub bold: bool,
    pub italic: bool,
    pub bitmap: bool,
    pub width: f32,
    pub height: f32,
}

impl TextBlock {
    fn from_json(json: &JsonText, width: f32, height: f32) -> Result<Self> {
        let color = match &json.color {
            Some(c) => parse_hex_color(c)?,
            None => BLACK,
        };
        Ok(TextBlock {
            text: json.text.clone(),
            font: json.fontfamily.clone().unwrap_or_else(|| "sans-serif".to_owned()),
            size: json.pixelsize.unwrap_or(16.0),
            color,
            halign: json.halign.clone().unwrap_or_else(|| "left".to_owned()),
            valign: json.valign.clone().unwrap_or_else(|| "top".to_owned()),
            wrap: json.wrap,
            bold: json.bold,
            italic: json.italic,
            bitmap: json.bitmap,
            width,
            height,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObjectKind {
    /// Carries a gid; drawn as a tile
    Tile,
    Text(TextBlock),
    Ellipse,
    Point,
    Polygon,
    Polyline,
    #[default]
    Rectangle,
}

/// One object of an object group, position already converted to top-left.
#[derive(Debug, Clone)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    /// `class`, falling back to the legacy `type`
    pub class_name: String,
    pub x: f32,
    pub y: f32,
    pub z: i32,
    pub width: f32,
    pub height: f32,
    /// Radians
    pub rotation: f32,
    pub gid: Option<u32>,
    pub tile: Option<TileRef>,
    pub tint: Option<Color>,
    pub visible: bool,
    pub opacity: f32,
    pub kind: ObjectKind,
    /// Shapes relative to the object position
    pub shapes: Vec<Shape>,
    pub properties: Properties,
    /// Unnamed shape of a collision group
    pub world_collision: bool,
}

impl Default for MapObject {
    fn default() -> Self {
        MapObject {
            id: 0,
            name: String::new(),
            class_name: String::new(),
            x: 0.0,
            y: 0.0,
            z: 0,
            width: 0.0,
            height: 0.0,
            rotation: 0.0,
            gid: None,
            tile: None,
            tint: None,
            visible: true,
            opacity: 1.0,
            kind: ObjectKind::default(),
            shapes: Vec::new(),
            properties: Properties::new(),
            world_collision: false,
        }
    }
}

impl MapObject {
    pub(crate) fn from_json(
        json: &JsonObject,
        ctx: &ParseContext<'_>,
        z: i32,
        collision_group: bool,
    ) -> Result<Self> {
        let mut obj = MapObject {
            id: json.id,
            name: json.name.clone(),
            class_name: if json.class.is_empty() { json.kind.clone() } else { json.class.clone() },
            x: json.x,
            y: json.y,
            z,
            width: json.width,
            height: json.height,
            rotation: json.rotation.to_radians(),
            gid: json.gid.filter(|&gid| gid != 0),
            tint: parse_tint(json.tintcolor.as_deref())?,
            visible: json.visible,
            properties: properties_from_json(&json.properties, json.propertytypes.as_ref())?,
            ..MapObject::default()
        };

        if let Some(gid) = obj.gid {
            let tileset = ctx.tilesets.get_tileset_by_gid(gid)?;
            if !tileset.is_collection {
                obj.width = tileset.tilewidth as f32;
                obj.height = tileset.tileheight as f32;
            }
            let tile = ctx.tilesets.tile_ref(0, 0, gid)?;
            obj.shapes = tileset.collision_shapes(tile.local_id()).to_vec();
            obj.tile = Some(tile);
            obj.kind = ObjectKind::Tile;
        } else if let Some(text) = &json.text {
            obj.kind = ObjectKind::Text(TextBlock::from_json(text, obj.width, obj.height)?);
        } else {
            obj.kind = shape_kind(json);
            obj.shapes = derive_shapes(
                &obj.kind,
                json,
                obj.rotation,
                ctx.orientation == Orientation::Isometric,
            )?;
        }

        obj.world_collision = collision_group && obj.name.is_empty() && !obj.is_text();
        ctx.renderer.adjust_position(&mut obj);
        Ok(obj)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, ObjectKind::Text(_))
    }

    pub fn text(&self) -> Option<&TextBlock> {
        match &self.kind {
            ObjectKind::Text(t) => Some(t),
            _ => None,
        }
    }
}

fn shape_kind(json: &JsonObject) -> ObjectKind {
    if json.ellipse {
        ObjectKind::Ellipse
    } else if json.point {
        ObjectKind::Point
    } else if json.polygon.is_some() {
        ObjectKind::Polygon
    } else if json.polyline.is_some() {
        ObjectKind::Polyline
    } else {
        ObjectKind::Rectangle
    }
}

fn points(list: Option<&Vec<JsonPoint>>) -> Vec<Vec2> {
    list.map(|pts| pts.iter().map(|p| vec2(p.x, p.y)).collect())
        .unwrap_or_default()
}

/// Shapes of a plain (non tile, non text) object, relative to its position.
fn derive_shapes(kind: &ObjectKind, json: &JsonObject, rotation: f32, iso: bool) -> Result<Vec<Shape>> {
    let (w, h) = (json.width, json.height);
    let mut shapes = match kind {
        ObjectKind::Ellipse => {
            let half = vec2(w / 2.0, h / 2.0);
            vec![Shape::Ellipse(Ellipse { pos: half, radius: half })]
        }
        ObjectKind::Point => vec![Shape::Point(Vec2::ZERO)],
        ObjectKind::Polygon => {
            let polygon = Polygon::new(Vec2::ZERO, points(json.polygon.as_ref()));
            match polygon.is_convex() {
                None => return Err(MapError::geometry("invalid polygon")),
                Some(false) => return Err(MapError::geometry("collision polygons must be convex")),
                Some(true) => vec![Shape::Polygon(polygon)],
            }
        }
        ObjectKind::Polyline => {
            // every segment owns copies of its end points
            let pts = points(json.polyline.as_ref());
            return Ok(finish(
                pts.windows(2)
                    .map(|pair| {
                        Shape::Line(Line {
                            pos: Vec2::ZERO,
                            points: [rotate_point(pair[0], rotation), rotate_point(pair[1], rotation)],
                        })
                    })
                    .collect(),
                iso,
            ));
        }
        _ => vec![Shape::Polygon(Polygon::rect(w, h))],
    };

    for shape in &mut shapes {
        shape.rotate(rotation);
    }
    Ok(finish(shapes, iso))
}

fn finish(mut shapes: Vec<Shape>, iso: bool) -> Vec<Shape> {
    if iso {
        shapes.iter_mut().for_each(Shape::to_iso);
    }
    shapes
}

/// Collision shapes authored on a tile, placed in tile-local pixels.
pub(crate) fn template_shapes(objects: &[JsonObject]) -> Result<Vec<Shape>> {
    let mut shapes = Vec::new();
    for json in objects {
        let kind = shape_kind(json);
        for mut shape in derive_shapes(&kind, json, json.rotation.to_radians(), false)? {
            shape.translate(vec2(json.x, json.y));
            shapes.push(shape);
        }
    }
    Ok(shapes)
}

/// Member of an object group.
#[derive(Debug)]
pub enum GroupChild {
    Object(MapObject),
    Layer(MapLayer),
    Group(ObjectGroup),
}

/// An `objectgroup` or `group` layer.
#[derive(Debug)]
pub struct ObjectGroup {
    pub name: String,
    pub z: i32,
    pub opacity: f32,
    pub width: f32,
    pub height: f32,
    pub properties: Properties,
    pub children: Vec<GroupChild>,
}

impl ObjectGroup {
    pub(crate) fn from_json(json: &JsonLayer, ctx: &ParseContext<'_>, z: i32) -> Result<Self> {
        let collision = json.name.to_lowercase().contains(COLLISION_GROUP);
        let mut group = ObjectGroup {
            name: json.name.clone(),
            z,
            opacity: effective_opacity(json.visible, json.opacity),
            width: (json.width * ctx.tilewidth) as f32,
            height: (json.height * ctx.tileheight) as f32,
            properties: properties_from_json(&json.properties, json.propertytypes.as_ref())?,
            children: Vec::with_capacity(json.objects.len() + json.layers.len()),
        };

        for object in &json.objects {
            group
                .children
                .push(GroupChild::Object(MapObject::from_json(object, ctx, z, collision)?));
        }

        // nested layers count up from the group's own z
        let mut child_z = z;
        for layer in &json.layers {
            let child = match layer.kind.as_str() {
                "tilelayer" => {
                    let tiles = TileLayer::from_json(layer, ctx, child_z)?;
                    group.width = group.width.max(tiles.width);
                    group.height = group.height.max(tiles.height);
                    GroupChild::Layer(MapLayer::Tiles(tiles))
                }
                "imagelayer" => GroupChild::Layer(MapLayer::Image(ImageLayer::from_json(layer, child_z)?)),
                "objectgroup" | "group" => GroupChild::Group(ObjectGroup::from_json(layer, ctx, child_z)?),
                other => {
                    warn!(group = %json.name, layer = %layer.name, kind = other, "unknown layer type skipped");
                    continue;
                }
            };
            group.children.push(child);
            child_z += 1;
        }

        debug!(group = %json.name, z, children = group.children.len(), "object group parsed");
        Ok(group)
    }

    /// Objects of this group, nested groups excluded.
    pub fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.children.iter().filter_map(|c| match c {
            GroupChild::Object(o) => Some(o),
            _ => None,
        })
    }

    pub fn is_collision_group(&self) -> bool {
        self.name.to_lowercase().contains(COLLISION_GROUP)
    }
}
