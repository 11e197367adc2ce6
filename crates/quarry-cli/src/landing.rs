//! HTML landing page listing the served routes.

// Internal imports (std, crate)
use quarry_core::RouteRegistry;

// External imports (alphabetized)
use serde::Serialize;
use tera::{Context, Tera};

const LANDING_TEMPLATE: &str = include_str!("../templates/index.html.tera");

#[derive(Debug, Serialize)]
struct RouteRow<'a> {
    method: &'static str,
    path: &'a str,
    summary: &'a str,
    parameters: Vec<&'a str>,
}

/// Render the landing page for `registry`
pub fn render(registry: &RouteRegistry, title: &str) -> tera::Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template("index.html", LANDING_TEMPLATE)?;

    let routes = registry
        .iter()
        .filter(|route| route.is_servable())
        .map(|route| RouteRow {
            method: route.method.as_str(),
            path: &route.path,
            summary: &route.summary,
            parameters: route.parameters.iter().map(|p| p.name.as_str()).collect(),
        })
        .collect::<Vec<_>>();

    let mut context = Context::new();
    context.insert("title", title);
    context.insert("routes", &routes);
    tera.render("index.html", &context)
}
