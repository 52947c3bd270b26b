use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, parsing or querying a tile map.
///
/// Every variant is terminal for the operation that produced it: map data is
/// treated as static and authoritative, so nothing here is worth retrying.
#[derive(Debug, Error)]
pub enum MapError {
    /// File I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// JSON parse error in a map or tileset file
    #[error("JSON parse error in {path}: {source}")]
    Json {
        /// File that failed to parse
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// JSON parse error for in-memory map data
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A tileset or layer image could not be loaded as a texture
    #[error("failed to load texture {path}: {reason}")]
    Texture {
        /// Image path
        path: PathBuf,
        /// Backend error message
        reason: String,
    },

    /// The map orientation matches none of the four known renderers
    #[error("unsupported map orientation: {0}")]
    UnsupportedOrientation(String),

    /// Unsupported file format, tile encoding or compression
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A gid resolved to no tileset
    #[error("no matching tileset for gid {gid}")]
    Lookup {
        /// The gid, flip flags cleared
        gid: u32,
    },

    /// Invalid collision geometry supplied by the map data
    #[error("{0}")]
    Geometry(String),

    /// Infinite (chunked) maps are not supported
    #[error("infinite maps are not supported")]
    InfiniteMap,

    /// A layer's decoded data does not cover `width * height` tiles
    #[error("invalid layer size for layer '{layer}': expected {expected} tiles, found {actual}")]
    InvalidLayerSize {
        /// Layer name
        layer: String,
        /// `width * height`
        expected: usize,
        /// Number of decoded gids
        actual: usize,
    },

    /// Tile coordinates outside a layer's grid
    #[error("tile ({x}, {y}) is outside the layer")]
    OutOfBounds {
        /// Column
        x: i64,
        /// Row
        y: i64,
    },

    /// Malformed csv/base64 tile data
    #[error("invalid tile data: {0}")]
    InvalidTileData(String),

    /// A user property declared an unknown type
    #[error("unsupported type '{kind}' for property '{name}'")]
    UnsupportedPropertyType {
        /// Property name
        name: String,
        /// Declared type
        kind: String,
    },

    /// A user property value could not be interpreted
    #[error("invalid value for property '{name}': {reason}")]
    InvalidProperty {
        /// Property name
        name: String,
        /// What went wrong
        reason: String,
    },

    /// A color string is not `#RRGGBB`, `#AARRGGBB`, `#RGB` or `#ARGB`
    #[error("invalid color '{0}'")]
    InvalidColor(String),

    /// Structurally invalid map
    #[error("invalid map: {0}")]
    InvalidMap(String),
}

impl MapError {
    pub(crate) fn geometry(msg: &str) -> Self {
        MapError::Geometry(msg.to_owned())
    }
}

/// Shorthand result type used across the crate.
pub type Result<T> = std::result::Result<T, MapError>;
