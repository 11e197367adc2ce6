//! Query templates: metadata, parameter typing, compilation and the route registry.

pub mod compiler;
pub mod metadata;
pub mod registry;
pub mod types;

pub use compiler::{is_servable_path, route_path, RouteDefinition, RESERVED_PATHS};
pub use metadata::{HttpMethod, ParamValueShape, ParamValues, TemplateMetadata};
pub use registry::RouteRegistry;
pub use types::{lookup_shape, ParameterSpec, Shape, ValueFormat, ValueType};
