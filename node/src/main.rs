// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Levy Token Node
//!
//! Entry point for the `levy-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores (or creates) the token, and serves the
//! HTTP/WS/JSON-RPC API.
//!
//! The binary supports four subcommands:
//!
//! - `run`: start the node
//! - `init`: create a data directory with a `levy.toml`
//! - `inspect`: print the token persisted in a data directory
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use levy_protocol::config::CONFIG_FILE_NAME;
use levy_protocol::storage::LevyDB;

use cli::{Commands, LevyNodeCli};
use config::{NodeConfig, NodeSection};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LevyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Inspect(args) => inspect_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: restores or creates the token, then serves the API and
/// metrics endpoints until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE_NAME));
    let mut config = NodeConfig::load_or_default(&config_path)?;
    if let Some(port) = args.rpc_port {
        config.node.rpc_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.node.metrics_port = port;
    }

    logging::init(&config.node)?;

    tracing::info!(
        rpc_port = config.node.rpc_port,
        metrics_port = config.node.metrics_port,
        data_dir = %args.data_dir.display(),
        config = %config_path.display(),
        "starting levy-node"
    );

    // --- Persistent storage ---
    let db = Arc::new(open_db(&args.data_dir)?);

    // --- Token ---
    let token = api::restore_or_initialize(&db, &config.genesis)?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Application state ---
    let app_state = api::AppState::new(
        format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            levy_protocol::config::PROTOCOL_VERSION,
        ),
        token,
        Arc::clone(&db) as Arc<dyn api::TokenStore>,
        Arc::clone(&node_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", config.node.rpc_host, config.node.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", config.node.rpc_host, config.node.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db.flush().context("failed to flush database on shutdown")?;
    tracing::info!("levy-node stopped");
    Ok(())
}

/// Creates a data directory and writes `levy.toml` with the genesis
/// parameters. The token itself is created on first `run`.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init(&NodeSection::default())?;

    let data_dir = &args.data_dir;
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let mut config = NodeConfig::default();
    if let Some(owner) = args.owner {
        config.genesis.owner = owner;
    }
    if let Some(treasury) = args.treasury {
        config.genesis.treasury = treasury;
    }
    if let Some(rate) = args.fee_rate {
        config.genesis.fee_rate = rate;
    }
    if let Some(variant) = args.variant {
        config.genesis.fee_variant = variant;
    }

    // Fail here rather than on first run.
    levy_contracts::TaxedToken::new(config.genesis.token_config(), config.genesis.owner)
        .context("invalid genesis parameters")?;

    std::fs::write(&config_path, config.to_toml()?)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    tracing::info!(path = %config_path.display(), "configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config file    : {}", config_path.display());
    println!("  Owner          : {}", config.genesis.owner);
    println!("  Treasury       : {}", config.genesis.treasury);
    println!("  Fee rate       : {}", config.genesis.fee_rate);
    println!("  Fee variant    : {}", config.genesis.fee_variant);

    Ok(())
}

/// Prints the persisted token of a stopped node.
fn inspect_node(args: cli::InspectArgs) -> Result<()> {
    let db = open_db(&args.data_dir)?;
    let Some(token) = api::load_token(&db)? else {
        bail!("no token persisted in {}", args.data_dir.display());
    };

    let metadata = token.metadata();
    println!("{} ({})", metadata.name, metadata.symbol);
    println!("  Owner          : {}", token.owner());
    println!("  Treasury       : {}", token.treasury());
    println!("  Total supply   : {}", token.total_supply());
    println!("  Fee rate       : {} / max {}", token.current_fee_rate(), token.max_fee_rate());
    println!("  Fee variant    : {}", token.variant());
    println!("  State          : {}", token.pause_state());
    println!("  Accounts       : {}", token.state().ledger.account_count());
    println!("  Conserved      : {}", token.conservation_holds());
    println!("  Notifications  : {}", token.events().len());

    if args.accounts {
        let mut accounts: Vec<_> = token.state().ledger.accounts().collect();
        accounts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (account, balance) in accounts {
            let exempt = if token.is_exempt(account) { " (exempt)" } else { "" };
            println!("    {} {}{}", account, balance, exempt);
        }
    }

    let skip = token.events().len().saturating_sub(args.events);
    for entry in token.events().iter().skip(skip) {
        println!("    #{:<6} {}", entry.seq, serde_json::to_string(&entry.event)?);
    }
    Ok(())
}

fn open_db(data_dir: &Path) -> Result<LevyDB> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = LevyDB::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");
    Ok(db)
}

/// Prints version information to stdout.
fn print_version() {
    println!("levy-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", levy_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
