//! netfleet entry point.
//!
//! Subcommands:
//! - `netfleet serve` (default) — HTTP server: `POST /mcp`, `GET /api/health`,
//!   `GET /api/events`
//! - `netfleet stdio` — line-delimited JSON-RPC on stdin/stdout, for MCP
//!   hosts that launch the server as a child process

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use netfleet::auth::{self, ApiKey};
use netfleet::driver::SshDriverFactory;
use netfleet::filter::CommandFilter;
use netfleet::inventory::loader;
use netfleet::{AppState, Config, Dispatcher};

/// MCP server for fleet-wide network device operations.
#[derive(Parser)]
#[command(name = "netfleet", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
    /// Run as a stdio MCP server (JSON-RPC on stdin/stdout).
    Stdio {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Stdio { config }) => {
            run_stdio(config.as_deref()).await;
        }
        Some(Commands::Serve { config }) => {
            run_server(config.as_deref()).await;
        }
        None => {
            run_server(None).await;
        }
    }
}

/// Build shared state from configuration: inventory, filter, dispatcher.
/// Exits the process on configuration errors — nothing should serve against
/// a half-loaded policy or inventory.
fn build_state(config: Config) -> AppState {
    let config = Arc::new(config);

    let inventory = match loader::load(&config.inventory) {
        Ok(inventory) => inventory,
        Err(e) => {
            error!("inventory load failed: {e}");
            std::process::exit(1);
        }
    };

    let filter = match CommandFilter::new(&config.blacklist.rules) {
        Ok(filter) => filter,
        Err(e) => {
            error!("blacklist load failed: {e}");
            std::process::exit(1);
        }
    };
    if filter.rule_count() == 0 {
        warn!("no blacklist rules configured — send_command is disabled (fail closed)");
    }

    let deadline = match config.server.dispatch_deadline_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let dispatcher = Dispatcher::new(
        Arc::new(SshDriverFactory),
        Arc::new(filter),
        config.server.num_workers,
        Duration::from_millis(config.server.host_timeout_ms),
        deadline,
    );

    info!(
        hosts = inventory.len(),
        workers = config.server.num_workers,
        "inventory loaded"
    );

    AppState::new(config, inventory, dispatcher)
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("netfleet v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", config.server.listen);

    if config.auth.api_key == "change-me" {
        warn!("Using default API key — set NETFLEET_API_KEY or update config");
    }

    let state = build_state(config);

    let public_routes = Router::new()
        .route("/api/health", get(netfleet::routes::health::health))
        .route("/api/events", get(netfleet::routes::events::event_stream));

    let authed_routes = Router::new()
        .route("/mcp", post(netfleet::routes::rpc::rpc))
        .layer(middleware::from_fn(auth::require_api_key));

    let app = Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .layer(Extension(ApiKey(state.config.auth.api_key.clone())))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    info!("Shutting down...");
}

async fn run_stdio(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // stdout carries the JSON-RPC stream; logs go to stderr.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    info!("netfleet v{} starting (stdio)", env!("CARGO_PKG_VERSION"));

    let state = build_state(config);
    netfleet::mcp::run_stdio(state).await;
}
