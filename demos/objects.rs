use macroquad::prelude::*;
use macroquad_tilemap::render::{MacroquadSurface, SurfaceFactory};
use macroquad_tilemap::{Container, MapEntity, MapObject, Shape, TileMap, Viewport};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn window_conf() -> Conf {
    Conf {
        window_title: "Objects Example".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

/// Flat scene: everything the map adds, drawn in z order.
struct Scene<'m> {
    children: Vec<MapEntity<'m>>,
    size: Vec2,
    pos: Vec2,
    background: Color,
}

impl<'m> Container<'m> for Scene<'m> {
    fn add_child(&mut self, child: MapEntity<'m>) {
        self.children.push(child);
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.size = vec2(width, height);
    }

    fn sort(&mut self, _recursive: bool) {
        self.children.sort_by_key(MapEntity::z);
    }

    fn set_background_color(&mut self, color: Color) {
        self.background = color;
    }

    fn set_position(&mut self, x: f32, y: f32) {
        self.pos = vec2(x, y);
    }
}

struct Screen;

impl Viewport for Screen {
    fn size(&self) -> Vec2 {
        vec2(screen_width(), screen_height())
    }

    fn set_bounds(&mut self, bounds: Rect) {
        debug!(?bounds, "camera bounds");
    }
}

fn draw_shapes(obj: &MapObject, color: Color) {
    let origin = vec2(obj.x, obj.y);
    for shape in &obj.shapes {
        match shape {
            Shape::Polygon(poly) => {
                let n = poly.points.len();
                for i in 0..n {
                    let a = origin + poly.pos + poly.points[i];
                    let b = origin + poly.pos + poly.points[(i + 1) % n];
                    draw_line(a.x, a.y, b.x, b.y, 1.0, color);
                }
            }
            Shape::Ellipse(e) => {
                let c = origin + e.pos;
                draw_ellipse_lines(c.x, c.y, e.radius.x, e.radius.y, 0.0, 1.0, color);
            }
            Shape::Line(line) => {
                let a = origin + line.pos + line.points[0];
                let b = origin + line.pos + line.points[1];
                draw_line(a.x, a.y, b.x, b.y, 1.0, color);
            }
            Shape::Point(p) => {
                let c = origin + *p;
                draw_circle(c.x, c.y, 2.0, color);
            }
        }
    }
}

async fn run(path: &str) -> anyhow::Result<()> {
    let mut map = TileMap::load(path)?;
    let mut surface = MacroquadSurface::load(&mut map).await?;
    map.activate_layers(Some(&mut surface as &mut dyn SurfaceFactory))?;

    let groups = map.object_groups()?;
    info!(
        object_groups = groups.len(),
        objects = groups.iter().map(|g| g.objects().count()).sum::<usize>(),
        "objects loaded"
    );

    let mut scene = Scene {
        children: Vec::new(),
        size: Vec2::ZERO,
        pos: Vec2::ZERO,
        background: BLACK,
    };
    let mut screen = Screen;
    let fit = map.add_to(&mut scene, true, Some(&mut screen as &mut dyn Viewport))?;
    info!(width = scene.size.x, height = scene.size.y, entities = scene.children.len(), "scene built");

    let mut last_size = vec2(screen_width(), screen_height());
    loop {
        let size = vec2(screen_width(), screen_height());
        if size != last_size {
            if let Some(fit) = fit {
                fit.apply(size.x, size.y, &mut screen, &mut scene);
            }
            last_size = size;
        }

        clear_background(scene.background);
        let view = Rect::new(-scene.pos.x, -scene.pos.y, size.x, size.y);
        set_camera(&Camera2D::from_display_rect(view));

        for entity in &scene.children {
            match entity {
                MapEntity::Layer(layer) => layer.draw(&mut surface, view),
                MapEntity::Object(placed) => {
                    let color = if placed.object.world_collision { RED } else { GREEN };
                    draw_shapes(placed.object, Color { a: placed.opacity, ..color });
                }
                MapEntity::Group(group) => {
                    for child in &group.children {
                        if let MapEntity::Object(placed) = child {
                            draw_shapes(placed.object, Color { a: group.opacity, ..YELLOW });
                        }
                    }
                }
            }
        }

        set_default_camera();
        draw_text("objects example", 20.0, 30.0, 32.0, WHITE);
        next_frame().await;
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "assets/map.json".to_owned());
    if let Err(e) = run(&path).await {
        tracing::error!(path = %path, error = %e, "failed to run objects demo");
    }
}
