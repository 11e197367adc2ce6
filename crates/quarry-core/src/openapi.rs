//! OpenAPI document synthesis from the compiled route registry.
//!
//! The document is a pure function of the registry and the server URL, so it
//! can be regenerated per request or written to disk ahead of time.
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use quarry_core::{Config, OpenApiContext, RouteDefinition, RouteRegistry};
//!
//! let route = RouteDefinition::from_source(
//!     Path::new("bands.rq"),
//!     "/bands",
//!     "#+ tags: [music]\nSELECT ?band WHERE { ?band <urn:formed> ?_year_integer }",
//! )?;
//! let registry = RouteRegistry::new(vec![route]);
//!
//! let spec = OpenApiContext::synthesize(&registry, "http://localhost:8088", &Config::default());
//! assert_eq!(spec.title(), Some("quarry"));
//! assert_eq!(spec.base_path().as_deref(), Some("http://localhost:8088"));
//! assert!(spec.as_json()["paths"]["/bands"]["get"].is_object());
//! # Ok::<(), quarry_core::Error>(())
//! ```

// Internal imports (std, crate)
use std::collections::{BTreeSet, HashSet};

use crate::{
    binder::{ENDPOINT_PARAM, PAGE_PARAM},
    config::Config,
    templates::{ParameterSpec, RouteDefinition, RouteRegistry},
};

// External imports (alphabetized)
use serde_json::{json, Map, Value as JsonValue};

/// OpenAPI version emitted in the `openapi` field
pub const OPENAPI_VERSION: &str = "3.0.3";

/// Synthesized OpenAPI document
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct OpenApiContext {
    /// The raw JSON value of the document
    pub json: JsonValue,
}

impl OpenApiContext {
    /// Describe every servable route of `registry`, served from `server_url`.
    ///
    /// Title and version come from `config`; its default endpoint, when set,
    /// is advertised as the default of the injected `endpoint` parameter.
    pub fn synthesize(registry: &RouteRegistry, server_url: &str, config: &Config) -> Self {
        let default_endpoint = config.default_endpoint.as_ref().map(|u| u.to_string());

        let mut paths = Map::new();
        let mut tags = BTreeSet::new();
        for route in registry.iter().filter(|r| r.is_servable()) {
            tags.extend(route.tags.iter().cloned());

            let item = paths
                .entry(route.path.clone())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if let JsonValue::Object(item) = item {
                // A later route with the same method replaces the earlier one, as in the router
                item.insert(
                    route.method.as_openapi_key(),
                    operation(route, default_endpoint.as_deref()),
                );
            }
        }

        let tags = tags
            .into_iter()
            .map(|name| json!({ "name": name }))
            .collect::<Vec<_>>();

        Self {
            json: json!({
                "openapi": OPENAPI_VERSION,
                "info": {
                    "title": config.title,
                    "version": config.api_version,
                },
                "servers": [{ "url": server_url }],
                "paths": paths,
                "tags": tags,
            }),
        }
    }

    /// Get a reference to the raw JSON value
    pub fn as_json(&self) -> &JsonValue {
        &self.json
    }

    /// Serialize the document as YAML
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(&self.json)?)
    }

    /// Get the title of the API
    pub fn title(&self) -> Option<&str> {
        self.json.get("info")?.get("title")?.as_str()
    }

    /// Get the version of the API
    pub fn version(&self) -> Option<&str> {
        self.json.get("info")?.get("version")?.as_str()
    }

    /// Get the first server URL
    pub fn base_path(&self) -> Option<String> {
        self.json
            .get("servers")?
            .as_array()?
            .first()?
            .get("url")?
            .as_str()
            .map(String::from)
    }
}

fn operation(route: &RouteDefinition, default_endpoint: Option<&str>) -> JsonValue {
    let summary = if route.summary.trim().is_empty() {
        route.relative_path().to_string()
    } else {
        route.summary.clone()
    };
    let description = if route.description.trim().is_empty() {
        format!("query: {}", route.name())
    } else {
        route.description.clone()
    };

    // Two placeholders sharing a name still make a single query parameter
    let mut seen = HashSet::new();
    let mut parameters = route
        .parameters
        .iter()
        .filter(|p| seen.insert(p.name.as_str()))
        .map(parameter)
        .collect::<Vec<_>>();

    if route.endpoint_in_url && route.endpoint.is_none() && seen.insert(ENDPOINT_PARAM) {
        let mut schema = json!({ "type": "string", "format": "uri" });
        if let Some(endpoint) = default_endpoint {
            schema["default"] = endpoint.into();
        }
        parameters.push(json!({
            "name": ENDPOINT_PARAM,
            "in": "query",
            "required": false,
            "description": "SPARQL endpoint to run the query against",
            "schema": schema,
        }));
    }
    if route.pagination.is_some() && seen.insert(PAGE_PARAM) {
        parameters.push(json!({
            "name": PAGE_PARAM,
            "in": "query",
            "required": false,
            "description": "1-based page number",
            "schema": { "type": "integer", "minimum": 1, "default": 1 },
        }));
    }

    let mut ok = json!({
        "description": "SPARQL query results",
        "content": {
            "application/json": { "schema": result_schema() },
        },
    });
    if let Some(limit) = route.pagination {
        ok["headers"] = json!({
            "Link": {
                "description": format!("Adjacent pages of {} results", limit),
                "schema": { "type": "string" },
            }
        });
    }

    json!({
        "summary": summary,
        "description": description,
        "tags": route.tags,
        "parameters": parameters,
        "responses": {
            "200": ok,
            "400": { "description": "No endpoint could be resolved, or a required parameter is missing" },
            "502": { "description": "The SPARQL endpoint failed to answer" },
        },
    })
}

fn parameter(param: &ParameterSpec) -> JsonValue {
    let mut schema = json!({ "type": param.value_type.as_str() });
    if let Some(format) = param.format {
        schema["format"] = format.as_str().into();
    }
    if let Some(values) = &param.enumeration {
        schema["enum"] = values.clone().into();
    }
    if let Some(default) = &param.default {
        schema["default"] = default.clone();
    }

    json!({
        "name": param.name,
        "in": "query",
        "required": param.required,
        "schema": schema,
    })
}

fn result_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "head": {
                "type": "object",
                "properties": {
                    "vars": { "type": "array", "items": { "type": "string" } },
                },
            },
            "results": {
                "type": "object",
                "properties": {
                    "bindings": {
                        "type": "array",
                        "items": { "type": "object" },
                    },
                },
            },
            "boolean": { "type": "boolean" },
        },
    })
}
