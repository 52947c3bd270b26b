//! What a map hands to the game's scene graph.
use crate::layer::MapLayer;
use crate::object::MapObject;
use macroquad::color::Color;
use macroquad::math::{vec2, Rect, Vec2};

/// One entry produced by [`TileMap::get_objects`](crate::TileMap::get_objects)
/// or added by [`TileMap::add_to`](crate::TileMap::add_to).
#[derive(Debug)]
pub enum MapEntity<'m> {
    Layer(&'m MapLayer),
    Object(PlacedObject<'m>),
    /// An object group kept together (`flatten == false`)
    Group(GroupContainer<'m>),
}

impl MapEntity<'_> {
    pub fn z(&self) -> i32 {
        match self {
            MapEntity::Layer(l) => l.z(),
            MapEntity::Object(o) => o.object.z,
            MapEntity::Group(g) => g.z,
        }
    }
}

/// A map object and the opacity it is shown with.
#[derive(Debug, Clone, Copy)]
pub struct PlacedObject<'m> {
    pub object: &'m MapObject,
    /// Object opacity, multiplied by its group's when flattened
    pub opacity: f32,
}

/// Sub-container standing for one object group.
#[derive(Debug)]
pub struct GroupContainer<'m> {
    pub name: &'m str,
    pub z: i32,
    pub opacity: f32,
    /// Sized to the map
    pub bounds: Rect,
    pub children: Vec<MapEntity<'m>>,
}

/// The scene-graph node a map is added to.
pub trait Container<'m> {
    fn add_child(&mut self, child: MapEntity<'m>);
    fn resize(&mut self, width: f32, height: f32);
    fn sort(&mut self, recursive: bool);
    fn set_background_color(&mut self, _color: Color) {}
    fn set_position(&mut self, x: f32, y: f32);
}

/// The camera view a map is shown through.
pub trait Viewport {
    fn size(&self) -> Vec2;
    fn set_bounds(&mut self, bounds: Rect);
}

/// Keeps a level visible in a viewport of any size.
///
/// Re-apply whenever the viewport is resized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    pub level: Vec2,
}

impl ViewportFit {
    pub fn new(level_width: f32, level_height: f32) -> Self {
        ViewportFit {
            level: vec2(level_width, level_height),
        }
    }

    /// Grow the viewport bounds to at least the level and centre a smaller level.
    pub fn apply<'m>(
        &self,
        width: f32,
        height: f32,
        viewport: &mut dyn Viewport,
        container: &mut dyn Container<'m>,
    ) {
        viewport.set_bounds(Rect::new(
            0.0,
            0.0,
            self.level.x.max(width),
            self.level.y.max(height),
        ));
        container.set_position(
            ((width - self.level.x) / 2.0).trunc().max(0.0),
            ((height - self.level.y) / 2.0).trunc().max(0.0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Camera {
        size: Vec2,
        bounds: Option<Rect>,
    }

    impl Viewport for Camera {
        fn size(&self) -> Vec2 {
            self.size
        }

        fn set_bounds(&mut self, bounds: Rect) {
            self.bounds = Some(bounds);
        }
    }

    #[derive(Default)]
    struct Node {
        pos: Vec2,
    }

    impl<'m> Container<'m> for Node {
        fn add_child(&mut self, _child: MapEntity<'m>) {}
        fn resize(&mut self, _width: f32, _height: f32) {}
        fn sort(&mut self, _recursive: bool) {}
        fn set_position(&mut self, x: f32, y: f32) {
            self.pos = vec2(x, y);
        }
    }

    #[test]
    fn small_levels_are_centred() {
        let fit = ViewportFit::new(300.0, 200.0);
        let (mut camera, mut node) = (Camera::default(), Node::default());

        fit.apply(801.0, 600.0, &mut camera, &mut node);
        assert_eq!(camera.bounds, Some(Rect::new(0.0, 0.0, 801.0, 600.0)));
        assert_eq!(node.pos, vec2(250.0, 200.0));
    }

    #[test]
    fn large_levels_stay_at_the_origin() {
        let fit = ViewportFit::new(2000.0, 1000.0);
        let (mut camera, mut node) = (Camera::default(), Node::default());

        fit.apply(800.0, 600.0, &mut camera, &mut node);
        assert_eq!(camera.bounds, Some(Rect::new(0.0, 0.0, 2000.0, 1000.0)));
        assert_eq!(node.pos, Vec2::ZERO);
    }
}
