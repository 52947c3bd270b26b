// tests/render_tests.rs

use macroquad::color::Color;
use macroquad::math::{vec2, Rect, Vec2};
use macroquad_tilemap::{DrawCommand, MapLayer, TileMap, TileRenderer, TileSurface};

#[derive(Default)]
struct Recorder {
    tiles: Vec<DrawCommand>,
    tints: Vec<Color>,
}

impl TileSurface for Recorder {
    fn draw_tile(&mut self, cmd: &DrawCommand) {
        self.tiles.push(*cmd);
    }

    fn set_tint(&mut self, tint: Color) {
        self.tints.push(tint);
    }
}

fn ortho(order: &str, data: &str) -> String {
    format!(
        r#"{{
      "orientation": "orthogonal", "renderorder": "{order}",
      "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
      "tilesets": [{{ "firstgid": 1, "tilewidth": 16, "tileheight": 16, "tilecount": 4, "columns": 2,
                      "image": "t.png", "imagewidth": 32, "imageheight": 32 }}],
      "layers": [{{ "type": "tilelayer", "name": "grid", "width": 2, "height": 2, "opacity": 0.5,
                    "data": {data} }}]
    }}"#
    )
}

fn draw_first_layer(map: &mut TileMap, rect: Rect) -> Recorder {
    let mut out = Recorder::default();
    let layer = map
        .get_layers()
        .expect("layers")
        .iter()
        .find_map(MapLayer::as_tiles)
        .expect("tile layer");
    layer.draw(&mut out, rect);
    out
}

#[test]
fn right_down_draws_rows_top_to_bottom() {
    let mut map = TileMap::from_json_str("rd", &ortho("right-down", "[1, 2, 3, 4]")).expect("map");
    let out = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 32.0, 32.0));

    let ids: Vec<u32> = out.tiles.iter().map(|c| c.tile_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    let dests: Vec<Vec2> = out.tiles.iter().map(|c| c.dest).collect();
    assert_eq!(
        dests,
        vec![vec2(0.0, 0.0), vec2(16.0, 0.0), vec2(0.0, 16.0), vec2(16.0, 16.0)]
    );
    assert_eq!(out.tiles[3].src, Rect::new(16.0, 16.0, 16.0, 16.0));
}

#[test]
fn left_up_draws_in_reverse() {
    let mut map = TileMap::from_json_str("lu", &ortho("left-up", "[1, 2, 3, 4]")).expect("map");
    let out = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 32.0, 32.0));

    let ids: Vec<u32> = out.tiles.iter().map(|c| c.tile_id).collect();
    assert_eq!(ids, vec![3, 2, 1, 0]);
}

#[test]
fn layer_opacity_tints_then_resets() {
    let mut map = TileMap::from_json_str("tint", &ortho("right-down", "[1, 0, 0, 0]")).expect("map");
    let out = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 32.0, 32.0));

    assert_eq!(out.tiles.len(), 1);
    assert_eq!(out.tints.len(), 2);
    assert_eq!(out.tints[0].a, 0.5);
    assert_eq!(out.tints[1], Color::new(1.0, 1.0, 1.0, 1.0));
}

#[test]
fn flip_bits_reach_the_draw_command() {
    // gid 1 with the horizontal and anti-diagonal flags set
    let data = format!("[{}, 0, 0, 0]", 0x8000_0000u32 | 0x2000_0000 | 1);
    let mut map = TileMap::from_json_str("flip", &ortho("right-down", &data)).expect("map");
    let out = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 32.0, 32.0));

    let cmd = out.tiles[0];
    assert_eq!(cmd.tile_id, 0);
    assert!(cmd.flip_x && !cmd.flip_y && cmd.flip_d);
}

#[test]
fn culling_skips_tiles_outside_the_view() {
    let json = r#"{
      "width": 8, "height": 8, "tilewidth": 16, "tileheight": 16,
      "tilesets": [{ "firstgid": 1, "tilewidth": 16, "tileheight": 16, "tilecount": 1, "columns": 1 }],
      "layers": [{ "type": "tilelayer", "name": "full", "width": 8, "height": 8,
                   "data": [1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1,
                            1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1] }]
    }"#;
    let mut map = TileMap::from_json_str("cull", json).expect("map");
    let all = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 128.0, 128.0));
    let part = draw_first_layer(&mut map, Rect::new(0.0, 0.0, 32.0, 32.0));

    assert_eq!(all.tiles.len(), 64);
    assert!(part.tiles.len() < 64);
    assert!(part.tiles.iter().all(|c| c.dest.x <= 48.0 && c.dest.y <= 48.0));
}

#[test]
fn isometric_layer_is_drawn_back_to_front() {
    let json = r#"{
      "orientation": "isometric",
      "width": 3, "height": 3, "tilewidth": 32, "tileheight": 16,
      "tilesets": [{ "firstgid": 1, "tilewidth": 32, "tileheight": 16, "tilecount": 9, "columns": 3 }],
      "layers": [{ "type": "tilelayer", "name": "iso", "width": 3, "height": 3,
                   "data": [1, 2, 3, 4, 5, 6, 7, 8, 9] }]
    }"#;
    let mut map = TileMap::from_json_str("iso", json).expect("map");
    let bounds = map.get_renderer().bounds();
    assert_eq!(bounds, Rect::new(0.0, 0.0, 96.0, 48.0));

    let out = draw_first_layer(&mut map, bounds);
    let mut ids: Vec<u32> = out.tiles.iter().map(|c| c.tile_id).collect();
    assert!(out.tiles.windows(2).all(|w| w[0].dest.y <= w[1].dest.y));
    assert_eq!(ids[0], 0);
    ids.sort_unstable();
    assert_eq!(ids, (0..9).collect::<Vec<u32>>());
}

#[test]
fn pointy_hex_map_offsets_odd_rows() {
    let json = r#"{
      "orientation": "hexagonal", "staggeraxis": "y", "staggerindex": "odd", "hexsidelength": 8,
      "width": 4, "height": 4, "tilewidth": 32, "tileheight": 34,
      "layers": []
    }"#;
    let mut map = TileMap::from_json_str("hex", json).expect("map");
    let renderer = map.get_renderer();

    assert_eq!(renderer.tile_anchor(0, 1), vec2(16.0, 21.0));
    let centre = renderer.tile_to_pixel_coords(0.0, 1.0);
    assert_eq!(centre, vec2(32.0, 38.0));
    assert_eq!(renderer.pixel_to_tile_coords(centre.x, centre.y), vec2(0.0, 1.0));
}

/// A map filled with gids `1..=cols * rows`, so tile id `i` sits at `(i % cols, i / cols)`.
fn stagger_map(orientation: &str, axis: &str, index: &str, cols: u32, rows: u32) -> TileMap {
    let (tw, th) = if orientation == "staggered" { (64, 32) } else { (32, 34) };
    let n = cols * rows;
    let data: Vec<String> = (1..=n).map(|gid| gid.to_string()).collect();
    let json = format!(
        r#"{{
      "orientation": "{orientation}", "staggeraxis": "{axis}", "staggerindex": "{index}", "hexsidelength": 8,
      "width": {cols}, "height": {rows}, "tilewidth": {tw}, "tileheight": {th},
      "tilesets": [{{ "firstgid": 1, "tilewidth": {tw}, "tileheight": {th}, "tilecount": {n}, "columns": {cols},
                      "image": "t.png", "imagewidth": {iw}, "imageheight": {ih} }}],
      "layers": [{{ "type": "tilelayer", "name": "grid", "width": {cols}, "height": {rows},
                    "data": [{data}] }}]
    }}"#,
        iw = cols * tw,
        ih = rows * th,
        data = data.join(", "),
    );
    TileMap::from_json_str(orientation, &json).expect("map")
}

const STAGGERED_KINDS: [(&str, &str, &str); 8] = [
    ("hexagonal", "x", "odd"),
    ("hexagonal", "x", "even"),
    ("hexagonal", "y", "odd"),
    ("hexagonal", "y", "even"),
    ("staggered", "x", "odd"),
    ("staggered", "x", "even"),
    ("staggered", "y", "odd"),
    ("staggered", "y", "even"),
];

#[test]
fn stagger_maps_draw_every_tile_once_at_its_anchor() {
    for (orientation, axis, index) in STAGGERED_KINDS {
        for (cols, rows) in [(5, 4), (6, 6)] {
            let mut map = stagger_map(orientation, axis, index, cols, rows);
            let renderer = map.get_renderer().clone();
            let out = draw_first_layer(&mut map, renderer.bounds());

            let mut ids: Vec<u32> = out.tiles.iter().map(|c| c.tile_id).collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..cols * rows).collect::<Vec<u32>>(), "{orientation} {axis} {index} {cols}x{rows}");
            for cmd in &out.tiles {
                let (x, y) = ((cmd.tile_id % cols) as i32, (cmd.tile_id / cols) as i32);
                assert_eq!(cmd.dest, renderer.tile_anchor(x, y), "{orientation} {axis} {index} ({x}, {y})");
            }
        }
    }
}

#[test]
fn stagger_views_draw_each_overlapping_tile() {
    for (orientation, axis, index) in STAGGERED_KINDS {
        let (cols, rows) = (5, 4);
        let mut map = stagger_map(orientation, axis, index, cols, rows);
        let renderer = map.get_renderer().clone();
        let bounds = renderer.bounds();

        for x in (0..bounds.w as i32).step_by(5) {
            for y in (0..bounds.h as i32).step_by(5) {
                for (w, h) in [(20.0, 20.0), (45.0, 30.0), (70.0, 70.0)] {
                    let view = Rect::new(x as f32, y as f32, w, h);
                    let out = draw_first_layer(&mut map, view);
                    let mut drawn: Vec<u32> = out.tiles.iter().map(|c| c.tile_id).collect();
                    drawn.sort_unstable();
                    let count = drawn.len();
                    drawn.dedup();
                    assert_eq!(drawn.len(), count, "{orientation} {axis} {index} {view:?}: duplicate draws");

                    let (tw, th) = renderer.tile_size();
                    for id in 0..cols * rows {
                        let anchor = renderer.tile_anchor((id % cols) as i32, (id / cols) as i32);
                        // touching edges do not count
                        let overlaps = anchor.x < view.right()
                            && anchor.x + tw as f32 > view.left()
                            && anchor.y < view.bottom()
                            && anchor.y + th as f32 > view.top();
                        if overlaps {
                            assert!(drawn.contains(&id), "{orientation} {axis} {index} {view:?}: tile {id} missing");
                        }
                    }
                }
            }
        }
    }
}
