use anyhow::{Context, Result};
use axum::{body::Body, http::Request, Router};
use clap::{Parser, Subcommand};
use jsonapi_core::QueryParser;
use jsonapi_exec::{Executor, InMemoryRepository};
use jsonapi_http::JsonApiState;
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::field::Empty;

mod fixtures;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// JSON:API server - filtered, sorted, paginated collections with includes
#[derive(Parser)]
#[command(name = "jsonapi-server")]
#[command(about = "JSON:API server - filtered, sorted, paginated collections with includes")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration, resource declarations and fixtures
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("JSON:API server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(&config),
    }
}

/// Registry, seeded repository, parser and executor, wired for the router.
fn build_state(config: &AppConfig) -> Result<Arc<JsonApiState>> {
    let registry = Arc::new(config.schema_registry()?);
    tracing::info!(resource_types = registry.len(), "schema registry built");

    let repository = InMemoryRepository::new(registry.clone());
    if let Some(path) = config.fixtures_path() {
        let resources = fixtures::load(&path, &registry)?;
        let count = repository
            .extend(resources)
            .context("Failed to seed repository")?;
        tracing::info!(count, path = %path.display(), "fixtures loaded");
    } else {
        tracing::warn!("No fixtures configured, serving empty collections");
    }

    Ok(Arc::new(JsonApiState::new(
        QueryParser::new(registry.clone(), config.query.clone()),
        Executor::new(registry, &config.query),
        Arc::new(repository),
    )))
}

fn app(state: Arc<JsonApiState>, timeout_sec: u64) -> Router {
    let mut router = jsonapi_http::router(state).layer(TraceLayer::new_for_http().make_span_with(
        |req: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri().path(),
                version = ?req.version(),
                status = Empty,
                latency_ms = Empty
            )
        },
    ));
    if timeout_sec > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(timeout_sec)));
    }
    router
}

async fn run_server(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;
    let router = app(state, config.server.timeout_sec);

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}:{}", addr.0, addr.1))?;
    tracing::info!("HTTP server bound on {}", listener.local_addr()?);

    let shutdown = async {
        if let Err(e) = runtime::wait_for_shutdown().await {
            tracing::warn!(error = %e, "signal handler failed; shutting down");
        }
        tracing::info!("HTTP server shutting down gracefully");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    build_state(config)?;
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}
