//! Quarry Core Library
//!
//! This library compiles a directory of SPARQL query templates into HTTP
//! route definitions, binds request parameters into them, shapes backend
//! results into responses, and synthesizes an OpenAPI description of the
//! whole route set.

pub mod backend;
pub mod binder;
pub mod config;
pub mod error;
pub mod openapi;
pub mod shaper;
pub mod templates;

pub use crate::{
    backend::{HttpBackend, QueryBackend, QueryResult, RdfTerm},
    binder::{Binder, BoundQuery, Pagination, RequestParams},
    config::Config,
    error::{Error, Result},
    openapi::OpenApiContext,
    shaper::{shape, ShapedResponse},
    templates::{HttpMethod, ParameterSpec, RouteDefinition, RouteRegistry},
};
