//! Tiled JSON maps for Macroquad: tilesets, layers, objects and the four
//! Tiled orientations (orthogonal, isometric, hexagonal, staggered).

mod color;
mod error;
mod geom;
mod layer;
pub mod loader {
    pub mod decode;
    pub(crate) mod json_loader;
}
mod map;
mod object;
mod properties;
pub mod render;
mod scene;
mod tile;
mod tileset;

pub use color::parse_hex_color;
pub use error::{MapError, Result};
pub use geom::{rotate_point, Ellipse, Line, Polygon, Shape};
pub use layer::{ColorLayer, ImageLayer, MapLayer, TileLayer};
pub use loader::decode::{decode, LayerData};
pub use map::{MapOptions, TileMap};
pub use object::{GroupChild, MapObject, ObjectGroup, ObjectKind, TextBlock, COLLISION_GROUP};
pub use properties::{Properties, PropertyValue};
pub use render::{
    DrawCommand, MapGeometry, Orientation, RenderOrder, Renderer, StaggerAxis, StaggerIndex,
    TileRenderer, TileSurface,
};
pub use scene::{Container, GroupContainer, MapEntity, PlacedObject, Viewport, ViewportFit};
pub use tile::{clean_gid, TileRef, FLIP_D, FLIP_H, FLIP_V, GID_MASK};
pub use tileset::{AnimationFrame, TileAnimation, TileImage, Tileset, TilesetGroup};
