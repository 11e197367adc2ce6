use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use quarry_cli::{build_router, AppState};
use quarry_core::{
    backend::Row, Config, Error, QueryBackend, QueryResult, RdfTerm, Result, RouteDefinition,
    RouteRegistry,
};
use serde_json::Value as JsonValue;
use tower::util::ServiceExt; // for `oneshot`

/// Backend answering every query with a canned result and recording what it was asked
struct StubBackend {
    answer: Option<QueryResult>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubBackend {
    fn answering(answer: QueryResult) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for StubBackend {
    async fn execute(&self, query: &str, endpoint: &str) -> Result<QueryResult> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), endpoint.to_string()));
        self.answer
            .clone()
            .ok_or_else(|| Error::backend("endpoint unavailable"))
    }
}

fn route(path: &str, source: &str) -> RouteDefinition {
    RouteDefinition::from_source(Path::new("test.rq"), path, source).unwrap()
}

fn rows(count: usize) -> QueryResult {
    QueryResult::Bindings {
        vars: vec!["s".into()],
        rows: (0..count)
            .map(|i| Row::from([("s".to_string(), RdfTerm::iri(format!("urn:s{}", i)))]))
            .collect(),
    }
}

fn config(default_endpoint: Option<&str>) -> Config {
    let mut config = Config::default();
    config.default_endpoint = default_endpoint.map(|e| e.parse().unwrap());
    config
}

fn app(routes: Vec<RouteDefinition>, backend: Arc<StubBackend>, config: Config) -> Router {
    build_router(AppState::new(RouteRegistry::new(routes), backend, config))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, "example.org")
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> JsonValue {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn literal_parameter_is_bound_and_executed() {
    let backend = StubBackend::answering(rows(1));
    let app = app(
        vec![route(
            "/names",
            "SELECT ?name WHERE { ?s <urn:hasName> ?_name_literal }",
        )],
        backend.clone(),
        config(Some("http://default/sparql")),
    );

    let response = app.oneshot(get("/names?name=Alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::LINK).is_none());

    let body = body_json(response).await;
    assert_eq!(body["head"]["vars"], serde_json::json!(["s"]));
    assert_eq!(body["results"]["bindings"][0]["s"]["type"], "uri");

    assert_eq!(
        backend.calls(),
        vec![(
            r#"SELECT ?name WHERE { ?s <urn:hasName> "Alice" }"#.to_string(),
            "http://default/sparql".to_string()
        )]
    );
}

#[tokio::test]
async fn paginated_route_links_adjacent_pages() {
    let backend = StubBackend::answering(rows(6));
    let app = app(
        vec![route(
            "/things",
            "#+ pagination: 5\nSELECT ?s WHERE { ?s ?p ?o }",
        )],
        backend.clone(),
        config(Some("http://default/sparql")),
    );

    let response = app.oneshot(get("/things?page=2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::LINK],
        r#"<http://example.org/things?page=1>; rel="previous", <http://example.org/things?page=3>; rel="next""#
    );

    let body = body_json(response).await;
    assert_eq!(body["results"]["bindings"].as_array().unwrap().len(), 5);

    let (query, _) = &backend.calls()[0];
    assert!(query.ends_with("\nLIMIT 6\nOFFSET 5"));
}

#[tokio::test]
async fn caller_endpoint_is_used_when_allowed() {
    let backend = StubBackend::answering(QueryResult::Boolean(true));
    let app = app(
        vec![route("/ask", "ASK { ?s ?p ?o }")],
        backend.clone(),
        config(None),
    );

    let response = app
        .oneshot(get("/ask?endpoint=http%3A%2F%2Fcaller%2Fsparql"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"head": {}, "boolean": true})
    );
    assert_eq!(backend.calls()[0].1, "http://caller/sparql");
}

#[tokio::test]
async fn missing_endpoint_is_a_bad_request() {
    let backend = StubBackend::answering(rows(0));
    let app = app(
        vec![route("/ask", "ASK { ?s ?p ?o }")],
        backend.clone(),
        config(None),
    );

    let response = app.oneshot(get("/ask")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await,
        "No SPARQL endpoint configured for this query"
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn backend_failure_is_a_bad_gateway() {
    let app = app(
        vec![route("/ask", "ASK { ?s ?p ?o }")],
        StubBackend::failing(),
        config(Some("http://default/sparql")),
    );

    let response = app.oneshot(get("/ask")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_text(response).await.contains("endpoint unavailable"));
}

#[tokio::test]
async fn strict_mode_rejects_missing_parameters() {
    let backend = StubBackend::answering(rows(0));
    let mut config = config(Some("http://default/sparql"));
    config.strict_params = true;
    let app = app(
        vec![route("/bands", "SELECT * WHERE { ?_band_iri ?p ?o }")],
        backend.clone(),
        config,
    );

    let response = app.oneshot(get("/bands")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_text(response).await,
        "Missing required parameters: band"
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn routes_are_served_under_their_declared_method() {
    let backend = StubBackend::answering(QueryResult::Boolean(false));
    let routes = vec![
        route("/items", "#+ method: POST\nASK { ?s ?p 1 }"),
        route("/items", "ASK { ?s ?p 2 }"),
    ];
    let app = app(routes, backend.clone(), config(Some("http://default/sparql")));

    let post = Request::builder()
        .method(Method::POST)
        .uri("/items")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.clone().oneshot(post).await.unwrap().status(), StatusCode::OK);
    assert_eq!(app.clone().oneshot(get("/items")).await.unwrap().status(), StatusCode::OK);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri("/items")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app.oneshot(delete).await.unwrap().status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    let queries: Vec<_> = backend.calls().into_iter().map(|(q, _)| q).collect();
    assert_eq!(queries, vec!["ASK { ?s ?p 1 }", "ASK { ?s ?p 2 }"]);
}

#[tokio::test]
async fn later_duplicate_route_wins() {
    let backend = StubBackend::answering(QueryResult::Boolean(true));
    let routes = vec![
        route("/dup", "ASK { ?s ?p 1 }"),
        route("/dup", "ASK { ?s ?p 2 }"),
    ];
    let app = app(routes, backend.clone(), config(Some("http://default/sparql")));

    let response = app.oneshot(get("/dup")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.calls()[0].0, "ASK { ?s ?p 2 }");
}

#[tokio::test]
async fn spec_document_is_served_as_yaml() {
    let app = app(
        vec![route(
            "/music/albums",
            "#+ tags: [music]\n#+ pagination: 10\nSELECT * WHERE { ?album <urn:by> ?_band_iri }",
        )],
        StubBackend::answering(rows(0)),
        config(Some("http://default/sparql")),
    );

    let response = app.oneshot(get("/spec.yaml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/yaml");

    let doc: JsonValue = serde_yaml::from_str(&body_text(response).await).unwrap();
    assert_eq!(doc["openapi"], "3.0.3");
    assert_eq!(doc["servers"][0]["url"], "http://example.org");
    assert_eq!(doc["tags"][0]["name"], "music");

    let params = doc["paths"]["/music/albums"]["get"]["parameters"]
        .as_array()
        .unwrap();
    let names: Vec<_> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["band", "endpoint", "page"]);
}

#[tokio::test]
async fn forwarded_scheme_is_used_for_links_and_servers() {
    let app = app(
        vec![route(
            "/things",
            "#+ pagination: 5\nSELECT ?s WHERE { ?s ?p ?o }",
        )],
        StubBackend::answering(rows(6)),
        config(Some("http://default/sparql")),
    );
    let behind_proxy = |uri: &str| {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "example.org")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(behind_proxy("/things")).await.unwrap();
    assert_eq!(
        response.headers()[header::LINK],
        r#"<https://example.org/things?page=2>; rel="next""#
    );

    let response = app.oneshot(behind_proxy("/spec.yaml")).await.unwrap();
    let doc: JsonValue = serde_yaml::from_str(&body_text(response).await).unwrap();
    assert_eq!(doc["servers"][0]["url"], "https://example.org");
}

#[tokio::test]
async fn reserved_template_path_is_neither_served_nor_described() {
    let backend = StubBackend::answering(QueryResult::Boolean(true));
    let app = app(
        vec![
            route("/spec.yaml", "ASK { ?s ?p 1 }"),
            route("/items", "ASK { ?s ?p 2 }"),
        ],
        backend.clone(),
        config(Some("http://default/sparql")),
    );

    let response = app.oneshot(get("/spec.yaml")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/yaml");
    let doc: JsonValue = serde_yaml::from_str(&body_text(response).await).unwrap();
    assert!(doc["paths"].get("/spec.yaml").is_none());
    assert!(doc["paths"]["/items"]["get"].is_object());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn landing_page_lists_routes() {
    let app = app(
        vec![route("/music/albums", "#+ summary: All albums\nSELECT * WHERE { ?s ?p ?o }")],
        StubBackend::answering(rows(0)),
        config(None),
    );

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("All albums"));
    assert!(html.contains("spec.yaml"));
}

#[tokio::test]
async fn registry_loaded_from_disk_is_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("music")).unwrap();
    std::fs::write(
        dir.path().join("music/bands.rq"),
        "#+ summary: Bands\nSELECT ?band WHERE { ?band <urn:formed> ?_year_integer }\n",
    )
    .unwrap();

    let mut config = config(Some("http://default/sparql"));
    config.template_dir = dir.path().to_path_buf();
    let registry = RouteRegistry::load(&config).await.unwrap();

    let backend = StubBackend::answering(rows(2));
    let app = build_router(AppState::new(registry, backend.clone(), config));

    let response = app.oneshot(get("/music/bands?year=1970")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        backend.calls()[0].0,
        "SELECT ?band WHERE { ?band <urn:formed> 1970 }"
    );
}
