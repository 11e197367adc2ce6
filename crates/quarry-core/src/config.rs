//! Configuration management for quarry.
//!
//! This module defines the `Config` struct holding everything the compiler,
//! binder and server need at construction time. The configuration can be
//! loaded from a YAML or TOML file, created programmatically, and then
//! overridden from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use quarry_core::config::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> quarry_core::Result<()> {
//! // Create a new config programmatically
//! let mut config = Config::new("queries");
//! config.default_endpoint = Some("https://dbpedia.org/sparql".parse().unwrap());
//!
//! // Or load from a config file
//! let config = Config::from_file("quarry.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

/// Configuration for a quarry server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory holding the query templates
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    /// Endpoint used when a template neither fixes one nor receives one from the caller
    #[serde(default)]
    pub default_endpoint: Option<Url>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// API title published in the OpenAPI document
    #[serde(default = "default_title")]
    pub title: String,

    /// API version published in the OpenAPI document
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// File extensions recognized as query templates
    #[serde(default = "default_template_extensions")]
    pub template_extensions: Vec<String>,

    /// Timeout applied to every backend request
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Reject requests that omit required parameters instead of forwarding them
    #[serde(default)]
    pub strict_params: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(default_template_dir())
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            default_endpoint: None,
            bind_address: default_bind_address(),
            title: default_title(),
            api_version: default_api_version(),
            template_extensions: default_template_extensions(),
            request_timeout_secs: None,
            strict_params: false,
        }
    }

    /// Load configuration from a YAML or TOML file, picked by extension
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string(self)
                .map_err(|e| crate::Error::config(format!("Failed to encode TOML: {}", e)))?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content).await?;
        Ok(())
    }

    /// Whether `ext` names a query template file
    pub fn is_template_extension(&self, ext: &str) -> bool {
        is_template_extension(&self.template_extensions, ext)
    }
}

/// Whether `ext` is one of `extensions`, ignoring case and a leading dot
pub fn is_template_extension(extensions: &[String], ext: &str) -> bool {
    extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("queries")
}

fn default_bind_address() -> String {
    "127.0.0.1:8088".to_string()
}

fn default_title() -> String {
    "quarry".to_string()
}

fn default_api_version() -> String {
    "0.1.0".to_string()
}

fn default_template_extensions() -> Vec<String> {
    vec!["rq".to_string(), "sparql".to_string()]
}
