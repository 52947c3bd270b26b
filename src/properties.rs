use crate::error::{MapError, Result};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A typed user-defined property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// `bool`
    Bool(bool),
    /// `int` and `object` (object references are ids)
    I64(i64),
    /// `float`
    F32(f32),
    /// `string`, `file` and `color`
    String(String),
    /// `class` values and `json:` prefixed strings
    Json(JsonValue),
}

/// User-defined properties attached to a map, layer, tileset, tile or object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: HashMap<String, PropertyValue>,
}

impl Properties {
    /// Empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    /// Raw access.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `None` when the stored integer does not fit an `i32`.
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            PropertyValue::F32(v) => Some(*v),
            PropertyValue::I64(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_json(&self, name: &str) -> Option<&JsonValue> {
        match self.get(name)? {
            PropertyValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One entry of the list form: `{"name": .., "type": .., "value": ..}`.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: JsonValue,
}

/// Tiled writes properties as a list; maps exported by older versions use a
/// plain `{name: value}` object with a sibling `propertytypes` object.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub(crate) enum JsonProperties {
    List(Vec<JsonProperty>),
    Map(serde_json::Map<String, JsonValue>),
}

impl Default for JsonProperties {
    fn default() -> Self {
        JsonProperties::List(Vec::new())
    }
}

fn untyped_value(name: &str, value: JsonValue) -> Result<Option<PropertyValue>> {
    Ok(match value {
        JsonValue::Bool(v) => Some(PropertyValue::Bool(v)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => Some(PropertyValue::I64(v)),
            None => n.as_f64().map(|v| PropertyValue::F32(v as f32)),
        },
        JsonValue::String(s) => Some(string_value(name, s)?),
        JsonValue::Null => None,
        other => Some(PropertyValue::Json(other)),
    })
}

fn string_value(name: &str, s: String) -> Result<PropertyValue> {
    let lower = s.get(..5).map(str::to_ascii_lowercase);
    if lower.as_deref() == Some("json:") {
        let parsed = serde_json::from_str(&s[5..]).map_err(|e| MapError::InvalidProperty {
            name: name.to_owned(),
            reason: format!("unable to parse JSON: {e}"),
        })?;
        return Ok(PropertyValue::Json(parsed));
    }
    Ok(PropertyValue::String(s))
}

fn typed_value(name: &str, kind: Option<&str>, value: JsonValue) -> Result<Option<PropertyValue>> {
    // values typed as strings by the XML exporter are normalised here
    let parsed = match kind {
        Some("bool") => match value {
            JsonValue::String(s) => Some(PropertyValue::Bool(s == "true")),
            v => v.as_bool().map(PropertyValue::Bool),
        },
        Some("int") | Some("object") => match value {
            JsonValue::String(s) => s.trim().parse().ok().map(PropertyValue::I64),
            v => v.as_i64().map(PropertyValue::I64),
        },
        Some("float") => match value {
            JsonValue::String(s) => s.trim().parse().ok().map(PropertyValue::F32),
            v => v.as_f64().map(|n| PropertyValue::F32(n as f32)),
        },
        Some("string") | Some("file") | Some("color") => match value {
            JsonValue::String(s) => Some(string_value(name, s)?),
            v => untyped_value(name, v)?,
        },
        Some("class") => Some(PropertyValue::Json(value)),
        Some(other) => {
            return Err(MapError::UnsupportedPropertyType {
                name: name.to_owned(),
                kind: other.to_owned(),
            });
        }
        None => untyped_value(name, value)?,
    };
    Ok(parsed)
}

/// Convert the raw JSON property records into a typed [`Properties`] set.
pub(crate) fn properties_from_json(
    props: &JsonProperties,
    types: Option<&serde_json::Map<String, JsonValue>>,
) -> Result<Properties> {
    let mut out = Properties::new();
    match props {
        JsonProperties::List(list) => {
            for p in list {
                if let Some(value) = typed_value(&p.name, p.kind.as_deref(), p.value.clone())? {
                    out.insert(p.name.clone(), value);
                }
            }
        }
        JsonProperties::Map(map) => {
            for (name, value) in map {
                let kind = types.and_then(|t| t.get(name)).and_then(JsonValue::as_str);
                if let Some(value) = typed_value(name, kind, value.clone())? {
                    out.insert(name.clone(), value);
                }
            }
        }
    }
    Ok(out)
}
