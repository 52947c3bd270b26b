// Serde records for the Tiled JSON format (.json / .tmj maps, .json / .tsj tilesets).
use crate::error::{MapError, Result};
use crate::loader::decode::LayerData;
use crate::properties::JsonProperties;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}
fn default_orientation() -> String {
    "orthogonal".to_owned()
}
fn default_layer_type() -> String {
    "tilelayer".to_owned()
}
fn default_renderorder() -> String {
    "right-down".to_owned()
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub(crate) struct JsonPoint {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct JsonMap {
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub tilewidth: u32,
    pub tileheight: u32,
    #[serde(default = "default_renderorder")]
    pub renderorder: String,
    #[serde(default)]
    pub hexsidelength: u32,
    #[serde(default)]
    pub staggeraxis: Option<String>,
    #[serde(default)]
    pub staggerindex: Option<String>,
    #[serde(default)]
    pub infinite: bool,
    #[serde(default)]
    pub backgroundcolor: Option<String>,
    // written as a number by old exporters, a string since 1.6
    #[serde(default)]
    pub version: Option<JsonValue>,
    #[serde(default)]
    pub tiledversion: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub nextobjectid: u32,
    #[serde(default)]
    pub tilesets: Vec<JsonTileset>,
    #[serde(default)]
    pub layers: Vec<JsonLayer>,
    #[serde(default)]
    pub properties: JsonProperties,
    #[serde(default)]
    pub propertytypes: Option<serde_json::Map<String, JsonValue>>,
}

/// Inline tileset, external tileset file, or a map entry pointing at one.
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct JsonTileset {
    #[serde(default)]
    pub firstgid: u32,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tilewidth: u32,
    #[serde(default)]
    pub tileheight: u32,
    #[serde(default)]
    pub spacing: u32,
    #[serde(default)]
    pub margin: u32,
    #[serde(default)]
    pub columns: u32,
    #[serde(default)]
    pub tilecount: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub imagewidth: u32,
    #[serde(default)]
    pub imageheight: u32,
    #[serde(default)]
    pub tileoffset: Option<JsonPoint>,
    #[serde(default)]
    pub tiles: Vec<JsonTile>,
    #[serde(default)]
    pub properties: JsonProperties,
    #[serde(default)]
    pub propertytypes: Option<serde_json::Map<String, JsonValue>>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct JsonTile {
    pub id: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub imagewidth: u32,
    #[serde(default)]
    pub imageheight: u32,
    #[serde(default)]
    pub animation: Vec<JsonFrame>,
    #[serde(default)]
    pub objectgroup: Option<JsonObjectGroup>,
    #[serde(default)]
    pub properties: JsonProperties,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub(crate) struct JsonFrame {
    pub tileid: u32,
    pub duration: u32,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct JsonObjectGroup {
    #[serde(default)]
    pub objects: Vec<JsonObject>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct JsonLayer {
    #[serde(rename = "type", default = "default_layer_type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub tilewidth: Option<u32>,
    #[serde(default)]
    pub tileheight: Option<u32>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default)]
    pub offsetx: f32,
    #[serde(default)]
    pub offsety: f32,
    #[serde(default = "one")]
    pub parallaxx: f32,
    #[serde(default = "one")]
    pub parallaxy: f32,
    #[serde(default)]
    pub tintcolor: Option<String>,

    // tilelayer
    #[serde(default)]
    pub data: Option<LayerData>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub compression: Option<String>,

    // imagelayer
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub repeatx: bool,
    #[serde(default)]
    pub repeaty: bool,

    // objectgroup / group
    #[serde(default)]
    pub objects: Vec<JsonObject>,
    #[serde(default)]
    pub layers: Vec<JsonLayer>,

    #[serde(default)]
    pub properties: JsonProperties,
    #[serde(default)]
    pub propertytypes: Option<serde_json::Map<String, JsonValue>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct JsonObject {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub ellipse: bool,
    #[serde(default)]
    pub point: bool,
    #[serde(default)]
    pub polygon: Option<Vec<JsonPoint>>,
    #[serde(default)]
    pub polyline: Option<Vec<JsonPoint>>,
    #[serde(default)]
    pub text: Option<JsonText>,
    #[serde(default)]
    pub tintcolor: Option<String>,
    #[serde(default)]
    pub properties: JsonProperties,
    #[serde(default)]
    pub propertytypes: Option<serde_json::Map<String, JsonValue>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct JsonText {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub fontfamily: Option<String>,
    #[serde(default)]
    pub pixelsize: Option<f32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub halign: Option<String>,
    #[serde(default)]
    pub valign: Option<String>,
    #[serde(default)]
    pub wrap: bool,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub bitmap: bool,
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a `.json` / `.tmj` map file; returns the record and the map directory.
pub(crate) fn read_map_file(path: &Path) -> Result<(JsonMap, PathBuf)> {
    if !has_extension(path, &["json", "tmj"]) {
        return Err(MapError::UnsupportedFormat(path.display().to_string()));
    }

    let map: JsonMap = read_json(path)?;
    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));

    Ok((map, map_dir))
}

pub(crate) fn parse_map_str(text: &str) -> Result<JsonMap> {
    Ok(serde_json::from_str(text)?)
}

/// Resolve a map tileset entry, loading its external file when it has a `source`.
///
/// The external tileset's image paths are rewritten relative to the map directory
/// and the map-local `firstgid` is kept.
pub(crate) fn resolve_tileset(entry: &JsonTileset, map_dir: Option<&Path>) -> Result<JsonTileset> {
    let Some(source) = entry.source.as_deref() else {
        return Ok(entry.clone());
    };

    let map_dir = map_dir.ok_or_else(|| {
        MapError::InvalidMap(format!(
            "external tileset '{source}' referenced by a map that was not loaded from a file"
        ))
    })?;

    let rel = Path::new(source);
    if !has_extension(rel, &["json", "tsj"]) {
        return Err(MapError::UnsupportedFormat(format!(
            "external tileset must be JSON: {source}"
        )));
    }

    let mut tileset: JsonTileset = read_json(&map_dir.join(rel))?;
    debug!(source, firstgid = entry.firstgid, "loaded external tileset");

    let ts_dir = rel.parent().unwrap_or_else(|| Path::new(""));
    let relocate = |image: &mut Option<String>| {
        if let Some(img) = image.as_mut() {
            *img = ts_dir.join(&*img).to_string_lossy().into_owned();
        }
    };
    relocate(&mut tileset.image);
    for tile in &mut tileset.tiles {
        relocate(&mut tile.image);
    }

    tileset.firstgid = entry.firstgid;
    tileset.source = None;
    Ok(tileset)
}

/// Normalised `version` string (`1.2` and `"1.10"` both accepted).
pub(crate) fn version_string(version: Option<&JsonValue>) -> Option<String> {
    match version? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compare dotted version strings numerically.
pub(crate) fn version_older_than(version: &str, reference: &str) -> bool {
    let parts = |v: &str| -> Vec<u32> { v.split('.').map(|p| p.trim().parse().unwrap_or(0)).collect() };
    let (a, b) = (parts(version), parts(reference));
    for i in 0..a.len().max(b.len()) {
        let (x, y) = (a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0));
        if x != y {
            return x < y;
        }
    }
    false
}
