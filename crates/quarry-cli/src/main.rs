//! quarry CLI entrypoint
//! Parses command-line arguments, compiles the template tree and serves or describes it.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use quarry_cli::{build_router, AppState};
use quarry_core::{Config, HttpBackend, OpenApiContext, RouteRegistry};
use tokio::fs;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Compile the query templates and serve them as an HTTP API
    Serve {
        /// Directory holding the query templates
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Default SPARQL endpoint
        #[arg(long)]
        endpoint: Option<Url>,
        /// Address to bind the server to (default: 127.0.0.1:8088)
        #[arg(long)]
        bind: Option<String>,
        /// Configuration file (YAML or TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Reject requests that omit required parameters
        #[arg(long)]
        strict: bool,
    },
    /// Compile the query templates and print the route table
    Routes {
        /// Directory holding the query templates
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Configuration file (YAML or TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compile the query templates and write the OpenAPI document
    Spec {
        /// Directory holding the query templates
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Server URL published in the document (default: http://<bind address>)
        #[arg(long)]
        server_url: Option<Url>,
        /// Output file; the document is printed when omitted
        #[arg(long)]
        output: Option<PathBuf>,
        /// Configuration file (YAML or TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; core `log` records are forwarded by the tracing-log bridge
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            templates,
            endpoint,
            bind,
            config,
            strict,
        } => {
            let mut config = load_config(config.as_deref(), templates).await?;
            if endpoint.is_some() {
                config.default_endpoint = endpoint;
            }
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            config.strict_params |= strict;
            serve(config).await
        }
        Commands::Routes { templates, config } => {
            let config = load_config(config.as_deref(), templates).await?;
            let registry = compile(&config).await?;
            print_routes(&registry);
            Ok(())
        }
        Commands::Spec {
            templates,
            server_url,
            output,
            config,
        } => {
            let config = load_config(config.as_deref(), templates).await?;
            let registry = compile(&config).await?;

            let server_url = server_url
                .map(|u| u.as_str().trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://{}", config.bind_address));
            let yaml = OpenApiContext::synthesize(&registry, &server_url, &config)
                .to_yaml()
                .context("Failed to serialize OpenAPI document")?;

            match output {
                Some(path) => {
                    fs::write(&path, yaml)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote OpenAPI document to {}", path.display());
                }
                None => print!("{}", yaml),
            }
            Ok(())
        }
    }
}

/// Load the configuration file when given, then apply the template directory override
async fn load_config(path: Option<&Path>, templates: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(templates) = templates {
        config.template_dir = templates;
    }
    Ok(config)
}

async fn compile(config: &Config) -> anyhow::Result<RouteRegistry> {
    RouteRegistry::load(config).await.with_context(|| {
        format!(
            "Failed to compile templates in {}",
            config.template_dir.display()
        )
    })
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let registry = compile(&config).await?;
    let backend = HttpBackend::from_config(&config).context("Failed to build HTTP client")?;

    match &config.default_endpoint {
        Some(endpoint) => tracing::info!("Default endpoint: {}", endpoint),
        None => tracing::warn!("No default endpoint; routes need a fixed or caller-supplied one"),
    }

    let bind_address = config.bind_address.clone();
    let route_count = registry.len();
    let app = build_router(AppState::new(registry, Arc::new(backend), config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Serving {} route(s) on http://{}", route_count, bind_address);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn print_routes(registry: &RouteRegistry) {
    if registry.is_empty() {
        println!("No query templates found");
        return;
    }
    for route in registry {
        let parameters = route
            .parameters
            .iter()
            .map(|p| {
                let kind = p.format.map(|f| f.as_str()).unwrap_or(p.value_type.as_str());
                if p.required {
                    format!("{}: {}", p.name, kind)
                } else {
                    format!("{}?: {}", p.name, kind)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let pagination = route
            .pagination
            .map(|limit| format!(" [page size {}]", limit))
            .unwrap_or_default();
        println!(
            "{:<7} {}({}){}",
            route.method.as_str(),
            route.path,
            parameters,
            pagination
        );
    }
}
