//! Execution of bound queries against a SPARQL endpoint.
//!
//! [`QueryBackend`] is the seam between request handling and the store; the
//! server uses [`HttpBackend`], which speaks the SPARQL 1.1 protocol and
//! decodes `application/sparql-results+json` answers into a [`QueryResult`].

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{config::Config, Error, Result};

// External imports (alphabetized)
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;

/// Media type of SPARQL JSON results
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// A single RDF term in a result row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum RdfTerm {
    #[serde(rename = "uri")]
    Iri { value: String },
    #[serde(rename = "literal", alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(rename = "xml:lang", default)]
        lang: Option<String>,
        #[serde(default)]
        datatype: Option<String>,
    },
    #[serde(rename = "bnode")]
    BlankNode { value: String },
}

impl RdfTerm {
    /// Lexical form of the term
    pub fn value(&self) -> &str {
        match self {
            Self::Iri { value } | Self::Literal { value, .. } | Self::BlankNode { value } => value,
        }
    }

    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri {
            value: value.into(),
        }
    }
}

/// One solution: variable name to bound term; unbound variables are absent
pub type Row = BTreeMap<String, RdfTerm>;

/// Raw answer of the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// SELECT-style answer
    Bindings { vars: Vec<String>, rows: Vec<Row> },
    /// ASK-style answer
    Boolean(bool),
}

#[derive(Debug, Deserialize)]
struct SparqlJson {
    #[serde(default)]
    head: SparqlHead,
    #[serde(default)]
    results: Option<SparqlResults>,
    #[serde(default)]
    boolean: Option<BoolLike>,
}

#[derive(Debug, Default, Deserialize)]
struct SparqlHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<Row>,
}

/// Some stores send the ASK answer as a string or number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl BoolLike {
    fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0,
            Self::Text(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1"),
        }
    }
}

impl QueryResult {
    /// Decode a `application/sparql-results+json` document
    pub fn from_sparql_json(body: &str) -> Result<Self> {
        let parsed: SparqlJson = serde_json::from_str(body)?;
        if let Some(answer) = parsed.boolean {
            return Ok(Self::Boolean(answer.truthy()));
        }
        match parsed.results {
            Some(results) => Ok(Self::Bindings {
                vars: parsed.head.vars,
                rows: results.bindings,
            }),
            None => Err(Error::backend(
                "SPARQL result has neither 'results' nor 'boolean'",
            )),
        }
    }
}

/// Executes a query text against an endpoint
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(&self, query: &str, endpoint: &str) -> Result<QueryResult>;
}

/// SPARQL 1.1 protocol client over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.request_timeout_secs.map(Duration::from_secs))
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn execute(&self, query: &str, endpoint: &str) -> Result<QueryResult> {
        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::backend(format!(
                "{} answered HTTP {}: {}",
                endpoint, status, body
            )));
        }

        let body = response.text().await?;
        QueryResult::from_sparql_json(&body).map_err(|e| {
            Error::backend(format!("Unreadable result from {}: {}", endpoint, e))
        })
    }
}
