// Tile layer data decoding: csv, base64 and pre-decoded gid arrays.
use crate::error::{MapError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;

/// Raw `data` field of a tile layer: already a gid array, or an encoded string.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum LayerData {
    /// `encoding: "none"` (the default for JSON maps)
    Gids(Vec<u32>),
    /// `encoding: "csv"` or `"base64"`
    Encoded(String),
}

/// Decode a tile layer's data into one gid per tile, row-major.
///
/// `encoding` and `compression` default to `"none"`. Compressed data is always
/// rejected, as is the deprecated per-tile `"xml"` encoding.
pub fn decode(data: &LayerData, encoding: Option<&str>, compression: Option<&str>) -> Result<Vec<u32>> {
    let encoding = encoding.unwrap_or("none");
    let compression = compression.unwrap_or("none");

    match (encoding, data) {
        ("csv", LayerData::Encoded(text)) => decode_csv(text),
        ("csv", LayerData::Gids(gids)) => Ok(gids.clone()),
        ("base64", LayerData::Encoded(text)) => {
            if compression != "none" && !compression.is_empty() {
                return Err(MapError::UnsupportedFormat(format!(
                    "{compression} compressed tile data"
                )));
            }
            decode_base64(text)
        }
        ("base64", LayerData::Gids(_)) => Err(MapError::InvalidTileData(
            "base64 encoding declared but data is an array".to_owned(),
        )),
        ("none", LayerData::Gids(gids)) => Ok(gids.clone()),
        ("none", LayerData::Encoded(_)) => Err(MapError::InvalidTileData(
            "string data without an encoding".to_owned(),
        )),
        ("xml", _) => Err(MapError::UnsupportedFormat(
            "XML encoding is deprecated, use base64 instead".to_owned(),
        )),
        (other, _) => Err(MapError::UnsupportedFormat(format!("unknown layer encoding: {other}"))),
    }
}

/// Comma separated gids; line breaks and surrounding whitespace are ignored.
pub fn decode_csv(input: &str) -> Result<Vec<u32>> {
    let cleaned: String = input.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    cleaned
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<u32>()
                .map_err(|_| MapError::InvalidTileData(format!("bad csv entry '{token}'")))
        })
        .collect()
}

/// Base64 bytes, packed four at a time little-endian into gids.
pub fn decode_base64(input: &str) -> Result<Vec<u32>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| MapError::InvalidTileData(format!("base64: {e}")))?;

    if bytes.len() % 4 != 0 {
        return Err(MapError::InvalidTileData(format!(
            "base64 payload of {} bytes is not a whole number of gids",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(s: &str) -> LayerData {
        LayerData::Encoded(s.to_owned())
    }

    #[test]
    fn csv_strips_newlines_and_spaces() {
        let data = encoded("1,0,0,2,\n 0,0,0,0,\n0,0,0,0,\n0,0,0,0");
        let gids = decode(&data, Some("csv"), None).unwrap();
        assert_eq!(gids.len(), 16);
        assert_eq!(&gids[..4], &[1, 0, 0, 2]);
        // decoding is deterministic
        assert_eq!(gids, decode(&data, Some("csv"), None).unwrap());
    }

    #[test]
    fn csv_keeps_flip_bits() {
        let gids = decode_csv("2147483649,3").unwrap();
        assert_eq!(gids, vec![0x8000_0001, 3]);
    }

    #[test]
    fn base64_packs_little_endian() {
        // 1, 0x80000002 little-endian
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0x80];
        let text = STANDARD.encode(bytes);
        let gids = decode(&encoded(&text), Some("base64"), Some("none")).unwrap();
        assert_eq!(gids, vec![1, 0x8000_0002]);
    }

    #[test]
    fn none_is_identity() {
        let data = LayerData::Gids(vec![0, 5, 7]);
        assert_eq!(decode(&data, Some("none"), Some("none")).unwrap(), vec![0, 5, 7]);
        assert_eq!(decode(&data, None, None).unwrap(), vec![0, 5, 7]);
    }

    #[test]
    fn compression_is_unsupported() {
        let text = STANDARD.encode([1u8, 0, 0, 0]);
        for compression in ["zlib", "gzip", "zstd"] {
            let err = decode(&encoded(&text), Some("base64"), Some(compression)).unwrap_err();
            assert!(matches!(err, MapError::UnsupportedFormat(_)));
        }
    }

    #[test]
    fn xml_and_unknown_encodings_are_unsupported() {
        let data = encoded("");
        assert!(matches!(decode(&data, Some("xml"), None), Err(MapError::UnsupportedFormat(_))));
        assert!(matches!(decode(&data, Some("hex"), None), Err(MapError::UnsupportedFormat(_))));
    }

    #[test]
    fn malformed_payloads_are_reported() {
        assert!(matches!(decode_csv("1,x,3"), Err(MapError::InvalidTileData(_))));
        assert!(matches!(decode_base64("AQID"), Err(MapError::InvalidTileData(_))));
    }
}
