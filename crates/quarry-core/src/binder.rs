//! Per-request binding of parameters into a compiled query.
//!
//! The binder resolves the endpoint, substitutes request values into the
//! placeholders of a [`RouteDefinition`] and appends the pagination window.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use std::path::Path;
//! use quarry_core::{Binder, RouteDefinition};
//!
//! let route = RouteDefinition::from_source(
//!     Path::new("names.rq"),
//!     "/names",
//!     "SELECT ?name WHERE { ?s <urn:hasName> ?_name_literal }",
//! )?;
//! let binder = Binder::new(Some("https://example.org/sparql".to_string()));
//!
//! let params = HashMap::from([("name".to_string(), "Alice".to_string())]);
//! let bound = binder.bind(&route, &params)?;
//! assert_eq!(bound.query, r#"SELECT ?name WHERE { ?s <urn:hasName> "Alice" }"#);
//! assert_eq!(bound.endpoint, "https://example.org/sparql");
//! # Ok::<(), quarry_core::Error>(())
//! ```

// Internal imports (std, crate)
use std::collections::HashMap;

use crate::{
    config::Config,
    templates::{ParameterSpec, RouteDefinition},
    Error, Result,
};

// External imports (alphabetized)
use regex::{Captures, Regex};

/// Query-string parameters of one request
pub type RequestParams = HashMap<String, String>;

/// Request parameter naming the endpoint chosen by the caller
pub const ENDPOINT_PARAM: &str = "endpoint";

/// Request parameter naming the requested page
pub const PAGE_PARAM: &str = "page";

/// Window of a paginated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub limit: u64,
    pub offset: u64,
}

impl Pagination {
    /// Build the window for `raw_page`; missing, unparseable or zero pages become page 1
    pub fn new(limit: u64, raw_page: Option<&str>) -> Self {
        let page = raw_page
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(1)
            .max(1);
        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// Rows requested from the backend: one more than a page, to detect a next page
    pub fn fetch_size(&self) -> u64 {
        self.limit.saturating_add(1)
    }

    /// Clause appended to the query text
    pub fn window_clause(&self) -> String {
        format!("\nLIMIT {}\nOFFSET {}", self.fetch_size(), self.offset)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Executable query produced for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuery {
    pub query: String,
    pub endpoint: String,
    pub pagination: Option<Pagination>,
}

/// Binds request parameters into compiled routes
#[derive(Debug, Clone, Default)]
pub struct Binder {
    default_endpoint: Option<String>,
    strict: bool,
}

impl Binder {
    /// Create a binder falling back to `default_endpoint`
    pub fn new(default_endpoint: Option<String>) -> Self {
        Self {
            default_endpoint,
            strict: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_endpoint.as_ref().map(|u| u.to_string()))
            .with_strict_params(config.strict_params)
    }

    /// Reject requests missing required parameters instead of leaving placeholders in place
    pub fn with_strict_params(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Produce the final query, endpoint and pagination window for a request.
    ///
    /// Absent or blank parameters leave their placeholder untouched unless
    /// strict mode is enabled, in which case missing required parameters fail.
    pub fn bind(&self, route: &RouteDefinition, params: &RequestParams) -> Result<BoundQuery> {
        let endpoint = self.resolve_endpoint(route, params)?;

        if self.strict {
            let missing = route
                .parameters
                .iter()
                .filter(|p| p.required && non_blank(params.get(&p.name)).is_none())
                .map(|p| p.name.clone())
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(Error::MissingParameters(missing));
            }
        }

        let replacements = route
            .parameters
            .iter()
            .filter_map(|param| {
                non_blank(params.get(&param.name))
                    .map(|value| (param.placeholder.as_str(), render_value(param, value)))
            })
            .collect::<HashMap<_, _>>();
        let mut query = substitute(&route.query, &replacements)?;

        let pagination = route
            .pagination
            .map(|limit| Pagination::new(limit, params.get(PAGE_PARAM).map(String::as_str)));
        if let Some(window) = &pagination {
            query.push_str(&window.window_clause());
        }

        log::debug!("Bound {} against {}:\n{}", route.path, endpoint, query);
        Ok(BoundQuery {
            query,
            endpoint,
            pagination,
        })
    }

    /// Fixed override, then the caller's `endpoint` parameter (when allowed), then the default
    pub fn resolve_endpoint(&self, route: &RouteDefinition, params: &RequestParams) -> Result<String> {
        let caller = if route.endpoint_in_url {
            non_blank(params.get(ENDPOINT_PARAM))
        } else {
            None
        };

        non_blank(route.endpoint.as_ref())
            .or(caller)
            .or(non_blank(self.default_endpoint.as_ref()))
            .map(|endpoint| endpoint.trim().to_string())
            .ok_or(Error::NoEndpoint)
    }
}

/// Render a request value as query text for the parameter's type.
///
/// IRIs are bracketed as-is, numbers and booleans are inserted verbatim, and
/// everything else becomes a double-quoted literal with embedded double
/// quotes backslash-escaped. No other characters are escaped.
pub fn render_value(param: &ParameterSpec, value: &str) -> String {
    if param.is_uri() {
        format!("<{}>", value)
    } else if param.value_type.is_raw_literal() {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

/// Replace every whole occurrence of each bound placeholder in one pass over `query`.
///
/// Inserted values are never rescanned, and longer tokens sharing a prefix
/// with a shorter one (`?_x_iri` and `?_x`) are matched as themselves.
fn substitute(query: &str, replacements: &HashMap<&str, String>) -> Result<String> {
    if replacements.is_empty() {
        return Ok(query.to_string());
    }

    let mut tokens = replacements.keys().copied().collect::<Vec<_>>();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = tokens
        .iter()
        .map(|token| format!(r"{}\b", regex::escape(token)))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&alternation)
        .map_err(|e| Error::template(format!("Invalid placeholder pattern {}: {}", alternation, e)))?;

    Ok(pattern
        .replace_all(query, |caps: &Captures<'_>| {
            let token = &caps[0];
            replacements
                .get(token)
                .cloned()
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned())
}

/// The value as supplied, unless it is absent or only whitespace
fn non_blank(value: Option<&String>) -> Option<&str> {
    value
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}
