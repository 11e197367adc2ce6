//! axum router hosting the compiled route table.
//!
//! Every template becomes one handler. Besides those, the router serves the
//! landing page at `/` and the synthesized OpenAPI document at `/spec.yaml`.

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::sync::Arc;

use quarry_core::{
    shape, Binder, Config, Error, HttpMethod, OpenApiContext, QueryBackend, RequestParams,
    RouteRegistry,
};

// External imports (alphabetized)
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, MethodFilter, MethodRouter},
    Json, Router,
};
use tower_http::trace::TraceLayer;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Shared, read-only state of the server
#[derive(Clone)]
pub struct AppState {
    pub registry: RouteRegistry,
    pub binder: Binder,
    pub backend: Arc<dyn QueryBackend>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: RouteRegistry, backend: Arc<dyn QueryBackend>, config: Config) -> Self {
        Self {
            registry,
            binder: Binder::from_config(&config),
            backend,
            config: Arc::new(config),
        }
    }

    /// `scheme://host` of the current request as the client sees it.
    ///
    /// `X-Forwarded-Proto` and `X-Forwarded-Host` set by a reverse proxy take
    /// precedence over the plain `http` scheme and the `Host` header; the bind
    /// address is the last resort.
    fn origin(&self, headers: &HeaderMap) -> String {
        let scheme = match forwarded(headers, X_FORWARDED_PROTO) {
            Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        };
        let host = forwarded(headers, X_FORWARDED_HOST)
            .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()))
            .unwrap_or(&self.config.bind_address);
        format!("{}://{}", scheme, host)
    }
}

/// Errors surfaced to HTTP callers as plain text
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_backend_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "request failed");
        } else {
            tracing::warn!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        (status, self.0.to_string()).into_response()
    }
}

/// Build the router for every route of `state.registry`.
///
/// Routes sharing a path are merged into one method router. When two
/// templates declare the same path and method, the later one is served and
/// the earlier one is reported as shadowed.
pub fn build_router(state: AppState) -> Router {
    let mut table: BTreeMap<&str, BTreeMap<HttpMethod, usize>> = BTreeMap::new();
    for (index, route) in state.registry.iter().enumerate() {
        if !route.is_servable() {
            tracing::warn!(path = %route.path, "template path cannot be routed, skipping");
            continue;
        }
        let methods = table.entry(route.path.as_str()).or_default();
        if let Some(shadowed) = methods.insert(route.method, index) {
            tracing::warn!(
                method = %route.method,
                path = %route.path,
                shadowed = shadowed,
                "duplicate route, the later template wins"
            );
        }
    }

    let mut router = Router::new()
        .route("/", get(landing_page))
        .route("/spec.yaml", get(spec_document));

    for (path, methods) in table {
        let mut method_router = MethodRouter::new();
        for (method, index) in methods {
            method_router = method_router.on(
                method_filter(method),
                move |State(state): State<AppState>,
                      Query(params): Query<RequestParams>,
                      headers: HeaderMap,
                      uri: Uri| async move {
                    run_query(state, index, params, headers, uri).await
                },
            );
        }
        tracing::debug!(path = %path, "registered route");
        router = router.route(path, method_router);
    }

    router
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                path = %req.uri().path(),
            )
        }))
        .with_state(state)
}

/// Bind, execute and shape one request against the route at `index`
async fn run_query(
    state: AppState,
    index: usize,
    params: RequestParams,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let route = state
        .registry
        .routes()
        .get(index)
        .ok_or_else(|| Error::template(format!("No compiled route at index {}", index)))?;

    let bound = state.binder.bind(route, &params)?;
    tracing::debug!(endpoint = %bound.endpoint, "executing {}", route.path);
    let result = state.backend.execute(&bound.query, &bound.endpoint).await?;

    let request_url = format!("{}{}", state.origin(&headers), uri.path());
    let shaped = shape(&result, bound.pagination.as_ref(), &request_url);

    let mut response = Json(shaped.body).into_response();
    if let Some(link) = shaped.link {
        match HeaderValue::from_str(&link) {
            Ok(value) => {
                response.headers_mut().insert(header::LINK, value);
            }
            Err(e) => tracing::warn!(error = %e, "Link header is not a valid header value"),
        }
    }
    Ok(response)
}

async fn spec_document(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let spec = OpenApiContext::synthesize(&state.registry, &state.origin(&headers), &state.config);
    let yaml = spec.to_yaml()?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response())
}

async fn landing_page(State(state): State<AppState>) -> Response {
    match crate::landing::render(&state.registry, &state.config.title) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render landing page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render landing page").into_response()
        }
    }
}

/// First hop of a comma-separated forwarding header
fn forwarded<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::QueryResult;

    struct NoBackend;

    #[async_trait::async_trait]
    impl QueryBackend for NoBackend {
        async fn execute(&self, _query: &str, _endpoint: &str) -> quarry_core::Result<QueryResult> {
            Err(Error::backend("no backend"))
        }
    }

    #[test]
    fn test_origin_honours_forwarding_headers() {
        let state = AppState::new(
            RouteRegistry::default(),
            Arc::new(NoBackend),
            Config::default(),
        );
        let headers = |pairs: &[(&'static str, &'static str)]| {
            pairs
                .iter()
                .map(|&(k, v)| (header::HeaderName::from_static(k), HeaderValue::from_static(v)))
                .collect::<HeaderMap>()
        };

        assert_eq!(state.origin(&headers(&[("host", "a.org")])), "http://a.org");
        assert_eq!(
            state.origin(&headers(&[("host", "a.org"), ("x-forwarded-proto", "https, http")])),
            "https://a.org"
        );
        assert_eq!(
            state.origin(&headers(&[("host", "a.org"), ("x-forwarded-proto", "gopher")])),
            "http://a.org"
        );
        assert_eq!(
            state.origin(&headers(&[
                ("host", "internal:8088"),
                ("x-forwarded-host", "api.a.org"),
            ])),
            "http://api.a.org"
        );
        assert_eq!(
            state.origin(&HeaderMap::new()),
            format!("http://{}", Config::default().bind_address)
        );
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |err: Error| ApiError(err).into_response().status();
        assert_eq!(status(Error::NoEndpoint), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(Error::MissingParameters(vec!["x".into()])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(Error::backend("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(status(Error::config("bad")), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
