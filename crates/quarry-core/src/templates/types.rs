//! Parameter types inferred from placeholder shape suffixes.
//!
//! A placeholder such as `?_born_date` carries its type in the final
//! underscore-delimited segment (`date`). This module holds the static table
//! mapping those suffixes to a value type and an optional format, plus the
//! `ParameterSpec` produced for every placeholder of a compiled template.
//!
//! # Examples
//!
//! ```
//! use quarry_core::templates::{ValueFormat, ValueType, lookup_shape};
//!
//! let shape = lookup_shape("iri");
//! assert_eq!(shape.value_type, ValueType::String);
//! assert_eq!(shape.format, Some(ValueFormat::Uri));
//!
//! // Unknown suffixes fall back to a plain string
//! assert_eq!(lookup_shape("color").value_type, ValueType::String);
//! assert_eq!(lookup_shape("color").format, None);
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Value type of a parameter, as published in the OpenAPI schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
}

impl ValueType {
    /// Returns the OpenAPI type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Whether values of this type are substituted verbatim into the query
    pub fn is_raw_literal(&self) -> bool {
        matches!(self, Self::Integer | Self::Number | Self::Boolean)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional refinement of a string-typed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueFormat {
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "date-time")]
    DateTime,
}

impl ValueFormat {
    /// Returns the OpenAPI format name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::Date => "date",
            Self::DateTime => "date-time",
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type and format resolved from a shape suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    pub value_type: ValueType,
    pub format: Option<ValueFormat>,
}

impl Shape {
    const fn new(value_type: ValueType, format: Option<ValueFormat>) -> Self {
        Self { value_type, format }
    }
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ValueType::*;
        let shape = match s.to_lowercase().as_str() {
            "iri" | "uri" => Shape::new(String, Some(ValueFormat::Uri)),
            "literal" | "string" | "str" => Shape::new(String, None),
            "integer" | "int" | "long" => Shape::new(Integer, None),
            "number" | "decimal" | "float" | "double" => Shape::new(Number, None),
            "boolean" | "bool" => Shape::new(Boolean, None),
            "date" => Shape::new(String, Some(ValueFormat::Date)),
            "datetime" => Shape::new(String, Some(ValueFormat::DateTime)),
            _ => return Err(format!("Unknown shape suffix: {}", s)),
        };
        Ok(shape)
    }
}

/// Look up the shape for a suffix, falling back to a plain string
pub fn lookup_shape(suffix: &str) -> Shape {
    suffix.parse().unwrap_or_default()
}

/// A query-string parameter derived from one placeholder token
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Externally visible query-string key
    pub name: String,
    /// Exact token in the query body, marker and suffix included
    pub placeholder: String,
    pub required: bool,
    pub value_type: ValueType,
    pub format: Option<ValueFormat>,
    /// Permitted values, in declaration order
    pub enumeration: Option<Vec<JsonValue>>,
    pub default: Option<JsonValue>,
}

impl ParameterSpec {
    /// Whether the parameter carries an IRI and is bracketed instead of quoted
    pub fn is_uri(&self) -> bool {
        self.value_type == ValueType::String && self.format == Some(ValueFormat::Uri)
    }
}
