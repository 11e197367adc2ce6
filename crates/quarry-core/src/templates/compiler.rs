//! Compilation of a single query template into a route definition.
//!
//! A template is a SPARQL query whose leading comment lines carry YAML
//! metadata and whose body contains placeholders of the form `?_name_suffix`
//! (or `$_name_suffix`). The suffix selects the parameter type; a suffix of
//! `optional_<type>` makes the parameter optional.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use quarry_core::templates::{RouteDefinition, ValueType};
//!
//! let source = "#+ summary: Bands\nSELECT ?band WHERE { ?band <urn:formed> ?_year_integer }";
//! let route = RouteDefinition::from_source(Path::new("bands/by_year.rq"), "/bands/by_year", source)?;
//!
//! assert_eq!(route.path, "/bands/by_year");
//! assert_eq!(route.summary, "Bands");
//! assert_eq!(route.parameters[0].name, "year");
//! assert_eq!(route.parameters[0].value_type, ValueType::Integer);
//! # Ok::<(), quarry_core::Error>(())
//! ```

// Internal imports (std, crate)
use std::path::{Component, Path};

use crate::{Error, Result};

use super::metadata::{HttpMethod, TemplateMetadata};
use super::types::{lookup_shape, ParameterSpec};

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::fs;

const COMMENT_MARKER: char = '#';
const CONTINUATION_MARKER: char = '+';

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?$]_\w+").expect("placeholder pattern is valid"));

static OPTIONAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+?)_optional_(\w+)$").expect("optional pattern is valid"));

/// An immutable, compiled query template exposed as one HTTP route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDefinition {
    /// Route path, e.g. `/music/albums`
    pub path: String,
    pub method: HttpMethod,
    /// Query body with placeholders still in place
    pub query: String,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Page size, when the route is paginated
    pub pagination: Option<u64>,
    /// Fixed endpoint; wins over anything supplied at request time
    pub endpoint: Option<String>,
    /// Whether callers may choose the endpoint per request
    pub endpoint_in_url: bool,
    /// Parameters in first-seen placeholder order
    pub parameters: Vec<ParameterSpec>,
}

impl RouteDefinition {
    /// Compile the template at `file`, deriving its route path from `root`.
    pub async fn compile(file: &Path, root: &Path) -> Result<Self> {
        let route_path = route_path(file, root)?;
        let source = fs::read_to_string(file).await?;
        Self::from_source(file, route_path, &source)
    }

    /// Compile template text whose route path is already known.
    ///
    /// `origin` is only used to report where malformed metadata came from.
    pub fn from_source(origin: &Path, path: impl Into<String>, source: &str) -> Result<Self> {
        let (metadata_text, query) = split_template(source);
        let metadata = TemplateMetadata::from_yaml(&metadata_text)
            .map_err(|e| Error::malformed(origin, e.to_string()))?;

        let parameters = placeholder_tokens(&query)
            .into_iter()
            .map(|token| parameter_spec(token, &metadata))
            .collect::<Vec<_>>();

        let path = path.into();
        warn_on_name_collisions(&path, &parameters);
        log::debug!(
            "Compiled {} {} with {} parameter(s)",
            metadata.method,
            path,
            parameters.len()
        );

        Ok(Self {
            path,
            method: metadata.method,
            query,
            summary: metadata.summary,
            description: metadata.description,
            tags: metadata.tags,
            pagination: metadata.pagination,
            endpoint: metadata.endpoint,
            endpoint_in_url: metadata.endpoint_in_url,
            parameters,
        })
    }

    /// Route path without its leading separator, e.g. `music/albums`
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Last segment of the route path, e.g. `albums`
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Look up a parameter by its query-string name
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether the route can be mounted at its path; see [`is_servable_path`]
    pub fn is_servable(&self) -> bool {
        is_servable_path(&self.path)
    }
}

/// Paths answered by the server itself
pub const RESERVED_PATHS: [&str; 2] = ["/", "/spec.yaml"];

/// A path is servable unless it is reserved or has a segment that a router
/// would read as a capture or wildcard (`:id`, `*rest`, `{id}`).
pub fn is_servable_path(path: &str) -> bool {
    !RESERVED_PATHS.contains(&path)
        && path
            .split('/')
            .all(|segment| !segment.starts_with([':', '*']) && !segment.contains(['{', '}']))
}

/// Derive the route path of `file` relative to `root`: extension dropped,
/// separators normalized to `/`, one leading `/`.
pub fn route_path(file: &Path, root: &Path) -> Result<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        Error::template(format!(
            "Template {} is outside of template root {}",
            file.display(),
            root.display()
        ))
    })?;

    let segments = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();

    if segments.is_empty() {
        return Err(Error::template(format!(
            "Cannot derive a route path for {}",
            file.display()
        )));
    }

    Ok(format!("/{}", segments.join("/")))
}

/// Split template text into the metadata document and the query body.
///
/// Only the uninterrupted run of comment lines at the top is metadata.
fn split_template(source: &str) -> (String, String) {
    let mut metadata = Vec::new();
    let mut lines = source.lines().peekable();

    while let Some(line) = lines.peek() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix(COMMENT_MARKER) else {
            break;
        };
        let rest = rest.strip_prefix(CONTINUATION_MARKER).unwrap_or(rest);
        metadata.push(rest.strip_prefix(' ').unwrap_or(rest));
        lines.next();
    }

    let query = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    (metadata.join("\n"), query)
}

/// Unique placeholder tokens in first-seen order
fn placeholder_tokens(query: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::new();
    for found in PLACEHOLDER_RE.find_iter(query) {
        if !tokens.contains(&found.as_str()) {
            tokens.push(found.as_str());
        }
    }
    tokens
}

/// Split the identifier part of a token into (name, suffix, required)
fn split_identifier(identifier: &str) -> (&str, &str, bool) {
    if let Some(caps) = OPTIONAL_RE.captures(identifier) {
        if let (Some(name), Some(suffix)) = (caps.get(1), caps.get(2)) {
            return (name.as_str(), suffix.as_str(), false);
        }
    }

    match identifier.rsplit_once('_') {
        Some((name, suffix)) if !name.is_empty() && !suffix.is_empty() => (name, suffix, true),
        _ => (identifier, "", true),
    }
}

fn parameter_spec(token: &str, metadata: &TemplateMetadata) -> ParameterSpec {
    // Tokens always start with a two-byte ASCII marker (`?_` or `$_`)
    let identifier = &token[2..];
    let (name, suffix, required) = split_identifier(identifier);
    let shape = lookup_shape(suffix);

    let enumeration = metadata.enumerate.get(name).map(|value| match value {
        JsonValue::Array(items) => items.clone(),
        other => vec![other.clone()],
    });

    ParameterSpec {
        name: name.to_string(),
        placeholder: token.to_string(),
        required,
        value_type: shape.value_type,
        format: shape.format,
        enumeration,
        default: metadata.defaults.get(name).cloned(),
    }
}

fn warn_on_name_collisions(path: &str, parameters: &[ParameterSpec]) {
    for (i, param) in parameters.iter().enumerate() {
        if let Some(other) = parameters[..i].iter().find(|p| p.name == param.name) {
            log::warn!(
                "Route {}: placeholders {} and {} share the parameter name '{}'",
                path,
                other.placeholder,
                param.placeholder,
                param.name
            );
        }
    }
}
