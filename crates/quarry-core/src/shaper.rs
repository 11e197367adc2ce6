//! Turns a backend result into the response body and `Link` header.
//!
//! # Examples
//!
//! ```
//! use quarry_core::backend::{QueryResult, RdfTerm};
//! use quarry_core::binder::Pagination;
//! use quarry_core::shaper::shape;
//!
//! let rows = (0..3)
//!     .map(|i| [("s".to_string(), RdfTerm::iri(format!("urn:{}", i)))].into())
//!     .collect();
//! let result = QueryResult::Bindings { vars: vec!["s".into()], rows };
//! let window = Pagination::new(2, Some("1"));
//!
//! let shaped = shape(&result, Some(&window), "http://localhost/things?page=1");
//! assert_eq!(shaped.body["results"]["bindings"].as_array().unwrap().len(), 2);
//! assert_eq!(
//!     shaped.link.as_deref(),
//!     Some(r#"<http://localhost/things?page=2>; rel="next""#)
//! );
//! ```

// Internal imports (std, crate)
use crate::{
    backend::{QueryResult, RdfTerm, Row},
    binder::Pagination,
};

// External imports (alphabetized)
use serde_json::{json, Map, Value as JsonValue};

/// Response ready to be written by the HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResponse {
    pub body: JsonValue,
    /// Value of the `Link` header, absent when there is no adjacent page
    pub link: Option<String>,
    pub has_next: bool,
}

/// Build the response document for `result`.
///
/// With an active pagination window, a result holding more rows than the
/// page size has its surplus row dropped and is marked as having a next page.
pub fn shape(
    result: &QueryResult,
    pagination: Option<&Pagination>,
    request_url: &str,
) -> ShapedResponse {
    let (body, has_next) = match result {
        QueryResult::Bindings { vars, rows } => {
            let limit = pagination.map(|p| p.limit);
            let has_next = limit.is_some_and(|limit| rows.len() as u64 > limit);
            let kept = if has_next { &rows[..rows.len() - 1] } else { &rows[..] };

            let bindings = kept.iter().map(binding_row).collect::<Vec<_>>();
            (
                json!({
                    "head": { "vars": vars },
                    "results": { "bindings": bindings },
                }),
                has_next,
            )
        }
        QueryResult::Boolean(answer) => (json!({ "head": {}, "boolean": answer }), false),
    };

    let link = pagination.and_then(|window| link_header(base_url(request_url), window, has_next));
    ShapedResponse {
        body,
        link,
        has_next,
    }
}

/// Request URL without its query string or fragment
pub fn base_url(request_url: &str) -> &str {
    request_url
        .split(['?', '#'])
        .next()
        .unwrap_or(request_url)
}

/// `previous`/`next` relations for the window, joined with `", "`
pub fn link_header(base: &str, window: &Pagination, has_next: bool) -> Option<String> {
    let mut links = Vec::new();
    if window.has_previous() {
        links.push(format!("<{}?page={}>; rel=\"previous\"", base, window.page - 1));
    }
    // The last representable page has no successor
    if let Some(next) = window.page.checked_add(1).filter(|_| has_next) {
        links.push(format!("<{}?page={}>; rel=\"next\"", base, next));
    }
    (!links.is_empty()).then(|| links.join(", "))
}

fn binding_row(row: &Row) -> JsonValue {
    row.iter()
        .map(|(var, term)| (var.clone(), binding_object(term)))
        .collect::<Map<_, _>>()
        .into()
}

fn binding_object(term: &RdfTerm) -> JsonValue {
    let mut object = Map::new();
    match term {
        RdfTerm::Iri { value } => {
            object.insert("type".into(), "uri".into());
            object.insert("value".into(), value.as_str().into());
        }
        RdfTerm::Literal {
            value,
            lang,
            datatype,
        } => {
            object.insert("type".into(), "literal".into());
            object.insert("value".into(), value.as_str().into());
            if let Some(lang) = lang {
                object.insert("xml:lang".into(), lang.as_str().into());
            }
            if let Some(datatype) = datatype {
                object.insert("datatype".into(), datatype.as_str().into());
            }
        }
        // Blank nodes are reported as literals carrying their label
        RdfTerm::BlankNode { value } => {
            object.insert("type".into(), "literal".into());
            object.insert("value".into(), value.as_str().into());
        }
    }
    object.into()
}
