//! Skin flag expansion
//!
//! The skin key carries a JSON object of boolean flags. Each recognized flag
//! becomes its own boolean-as-numeric observation named
//! `<semantic key>++<flag>`.

use serde_json::{Map, Value};
use std::fmt;

/// Semantic key whose value is the JSON skin object.
pub const SKIN_KEY: &str = "metrics:players:skin";

/// Separator between the semantic key and a flag name in sub-metric keys.
pub const SUB_KEY_SEPARATOR: &str = "++";

/// Flags projected out of the skin object, in emission order.
pub const SKIN_FLAGS: [&str; 7] = [
    "cape",
    "jacket",
    "hat",
    "right_pants",
    "left_pants",
    "left_sleeve",
    "right_sleeve",
];

/// Why the skin value as a whole could not be expanded
#[derive(Debug)]
pub enum SkinError {
    InvalidJson(serde_json::Error),
    NotAnObject,
}

impl fmt::Display for SkinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkinError::InvalidJson(e) => write!(f, "skin value is not valid JSON: {}", e),
            SkinError::NotAnObject => write!(f, "skin value is not a JSON object"),
        }
    }
}

impl std::error::Error for SkinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SkinError::InvalidJson(e) => Some(e),
            SkinError::NotAnObject => None,
        }
    }
}

/// Why a single flag could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkinFieldError {
    Missing(&'static str),
    NotBoolean(&'static str),
}

impl fmt::Display for SkinFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkinFieldError::Missing(flag) => write!(f, "skin flag '{}' is missing", flag),
            SkinFieldError::NotBoolean(flag) => {
                write!(f, "skin flag '{}' is not a boolean", flag)
            }
        }
    }
}

impl std::error::Error for SkinFieldError {}

/// One flag's outcome: its sub-metric key and value, or why it was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinFlag {
    pub name: &'static str,
    pub value: Result<f64, SkinFieldError>,
}

impl SkinFlag {
    /// Sub-metric key, e.g. `metrics:players:skin++cape`.
    pub fn sub_key(&self, semantic_key: &str) -> String {
        format!("{}{}{}", semantic_key, SUB_KEY_SEPARATOR, self.name)
    }
}

/// Parse the skin object and read every known flag.
///
/// Fails only when the value is not a JSON object; problems with single
/// flags are reported per flag.
pub fn expand(raw: &str) -> Result<Vec<SkinFlag>, SkinError> {
    let parsed: Value = serde_json::from_str(raw).map_err(SkinError::InvalidJson)?;
    let object = parsed.as_object().ok_or(SkinError::NotAnObject)?;

    Ok(SKIN_FLAGS
        .iter()
        .map(|&name| SkinFlag {
            name,
            value: read_flag(object, name).map(bool_to_f64),
        })
        .collect())
}

fn read_flag(object: &Map<String, Value>, name: &'static str) -> Result<bool, SkinFieldError> {
    match object.get(name) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(SkinFieldError::NotBoolean(name)),
        None => Err(SkinFieldError::Missing(name)),
    }
}

#[inline]
pub fn bool_to_f64(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
