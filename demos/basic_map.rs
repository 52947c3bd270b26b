use macroquad::prelude::*;
use macroquad_tilemap::render::{MacroquadSurface, SurfaceFactory};
use macroquad_tilemap::{MapOptions, TileMap};
use tracing_subscriber::EnvFilter;

fn window_conf() -> Conf {
    Conf {
        window_title: "Basic Map".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

const SCROLL_SPEED: f32 = 240.0;

async fn run(path: &str) -> anyhow::Result<()> {
    let mut map = TileMap::load(path)?.with_options(MapOptions { pre_render: true });
    let mut surface = MacroquadSurface::load(&mut map).await?;
    map.activate_layers(Some(&mut surface as &mut dyn SurfaceFactory))?;

    let mut view = Rect::new(0.0, 0.0, screen_width(), screen_height());
    let mut tick: u64 = 0;

    loop {
        tick += 1;
        let dt = get_frame_time();

        let mut dir = Vec2::ZERO;
        if is_key_down(KeyCode::Left) {
            dir.x -= 1.0;
        }
        if is_key_down(KeyCode::Right) {
            dir.x += 1.0;
        }
        if is_key_down(KeyCode::Up) {
            dir.y -= 1.0;
        }
        if is_key_down(KeyCode::Down) {
            dir.y += 1.0;
        }
        view.x = (view.x + dir.x * SCROLL_SPEED * dt).max(0.0);
        view.y = (view.y + dir.y * SCROLL_SPEED * dt).max(0.0);
        view.w = screen_width();
        view.h = screen_height();

        clear_background(BLACK);
        set_camera(&Camera2D::from_display_rect(view));

        // animation durations are in milliseconds
        for layer in map.get_layers()? {
            layer.update(dt * 1000.0, tick);
            layer.draw(&mut surface, view);
        }

        set_default_camera();
        draw_text(&format!("FPS: {}", get_fps()), screen_width() - 135.0, 55.0, 30.0, RED);

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
        tracing::error!(path = %path, error = %e, "failed to run map demo");
    }
}
