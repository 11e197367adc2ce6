//! Metadata block format for query templates.
//!
//! The leading comment lines of a template form a YAML document describing
//! the route: method, summary, tags, pagination, endpoint handling and
//! per-parameter enumerations and defaults.
//!
//! ```text
//! #+ summary: Albums by a band
//! #+ method: GET
//! #+ pagination: 20
//! #+ tags:
//! #+   - music
//! #+ enumerate:
//! #+   - genre:
//! #+     - rock
//! #+     - jazz
//! ```

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use serde_value::Value as SerdeValue;

/// Values attached to parameters by name (enumerations or defaults)
pub type ParamValues = BTreeMap<String, JsonValue>;

/// HTTP method a template is exposed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(format!("Unsupported HTTP method: {}", s)),
        }
    }
}

impl HttpMethod {
    /// Returns the method name in upper case
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Returns the method name as used for OpenAPI operation keys
    pub fn as_openapi_key(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parsed metadata block of a single template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub method: HttpMethod,

    /// Page size; absent, zero or non-numeric disables pagination
    #[serde(default, deserialize_with = "deserialize_pagination")]
    pub pagination: Option<u64>,

    /// Fixed endpoint overriding anything the caller or the server supplies
    #[serde(default, deserialize_with = "deserialize_endpoint")]
    pub endpoint: Option<String>,

    /// Whether callers may pick the endpoint with an `endpoint` query parameter
    #[serde(default = "default_true")]
    pub endpoint_in_url: bool,

    #[serde(default, deserialize_with = "deserialize_param_values")]
    pub enumerate: ParamValues,

    #[serde(default, deserialize_with = "deserialize_param_values")]
    pub defaults: ParamValues,
}

impl Default for TemplateMetadata {
    fn default() -> Self {
        Self {
            summary: String::new(),
            description: String::new(),
            tags: Vec::new(),
            method: HttpMethod::default(),
            pagination: None,
            endpoint: None,
            endpoint_in_url: true,
            enumerate: ParamValues::new(),
            defaults: ParamValues::new(),
        }
    }
}

impl TemplateMetadata {
    /// Parse a metadata document.
    ///
    /// An empty document, or one that is not a mapping (for instance a line
    /// of prose in a comment), yields the default metadata. Only YAML syntax
    /// errors and invalid values for recognized keys are reported.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;
        match document {
            serde_yaml::Value::Mapping(_) => serde_yaml::from_value(document),
            serde_yaml::Value::Null => Ok(Self::default()),
            other => {
                log::warn!(
                    "Ignoring template metadata that is not a mapping: {:?}",
                    other
                );
                Ok(Self::default())
            }
        }
    }
}

/// The two accepted spellings of a name-to-value mapping.
///
/// ```yaml
/// defaults:            # a plain mapping
///   genre: rock
/// defaults:            # a list of single-entry mappings
///   - genre: rock
///   - year: 1999
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValueShape {
    Mapping(Vec<(String, JsonValue)>),
    EntryList(Vec<Vec<(String, JsonValue)>>),
    Unsupported,
}

impl From<SerdeValue> for ParamValueShape {
    fn from(value: SerdeValue) -> Self {
        match value {
            SerdeValue::Map(map) => Self::Mapping(map_entries(map)),
            SerdeValue::Seq(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        SerdeValue::Map(map) => entries.push(map_entries(map)),
                        _ => return Self::Unsupported,
                    }
                }
                Self::EntryList(entries)
            }
            _ => Self::Unsupported,
        }
    }
}

impl ParamValueShape {
    /// Flatten into a single mapping; later list entries win on collisions
    pub fn normalize(self) -> ParamValues {
        match self {
            Self::Mapping(entries) => entries.into_iter().collect(),
            Self::EntryList(list) => list.into_iter().flatten().collect(),
            Self::Unsupported => ParamValues::new(),
        }
    }
}

fn map_entries(map: BTreeMap<SerdeValue, SerdeValue>) -> Vec<(String, JsonValue)> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let key = scalar_to_string(&key)?;
            let value = value.deserialize_into::<JsonValue>().ok()?;
            Some((key, value))
        })
        .collect()
}

fn scalar_to_string(value: &SerdeValue) -> Option<String> {
    match value {
        SerdeValue::String(s) => Some(s.clone()),
        SerdeValue::Char(c) => Some(c.to_string()),
        SerdeValue::Bool(b) => Some(b.to_string()),
        SerdeValue::U8(n) => Some(n.to_string()),
        SerdeValue::U16(n) => Some(n.to_string()),
        SerdeValue::U32(n) => Some(n.to_string()),
        SerdeValue::U64(n) => Some(n.to_string()),
        SerdeValue::I8(n) => Some(n.to_string()),
        SerdeValue::I16(n) => Some(n.to_string()),
        SerdeValue::I32(n) => Some(n.to_string()),
        SerdeValue::I64(n) => Some(n.to_string()),
        SerdeValue::F32(n) => Some(n.to_string()),
        SerdeValue::F64(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_u64(value: &SerdeValue) -> Option<u64> {
    match value {
        SerdeValue::U8(n) => Some(u64::from(*n)),
        SerdeValue::U16(n) => Some(u64::from(*n)),
        SerdeValue::U32(n) => Some(u64::from(*n)),
        SerdeValue::U64(n) => Some(*n),
        SerdeValue::I8(n) => u64::try_from(*n).ok(),
        SerdeValue::I16(n) => u64::try_from(*n).ok(),
        SerdeValue::I32(n) => u64::try_from(*n).ok(),
        SerdeValue::I64(n) => u64::try_from(*n).ok(),
        SerdeValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

/// Accept a single tag or a list of tags; duplicates are dropped keeping first position
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    let raw = match value {
        SerdeValue::Seq(seq) => seq.iter().filter_map(scalar_to_string).collect(),
        SerdeValue::Unit | SerdeValue::Option(None) => Vec::new(),
        other => scalar_to_string(&other).into_iter().collect(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn deserialize_pagination<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;
    Ok(scalar_to_u64(&value).filter(|size| *size > 0))
}

fn deserialize_endpoint<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn deserialize_param_values<'de, D>(deserializer: D) -> Result<ParamValues, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;
    Ok(ParamValueShape::from(value).normalize())
}
