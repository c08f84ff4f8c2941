// Copyright (c) 2026 Haven Labs. MIT License.
// See LICENSE for details.

//! # Haven Gateway Node
//!
//! Entry point for the `haven-node` binary. Parses CLI arguments,
//! initializes logging, builds one in-memory registry deployment, and
//! serves the HTTP API until interrupted.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the gateway node
//! - `version` — print build version information

mod api;
mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

use haven_engine::config::ENGINE_VERSION;
use haven_engine::{Address, StaticProofVerifier, VaultRegistry};

use cli::{Commands, HavenNodeCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HavenNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the gateway: builds the registry deployment and serves the API.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "haven_node=info,haven_engine=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let owner: Address = args
        .owner
        .parse()
        .with_context(|| format!("invalid owner address: {}", args.owner))?;
    let custody: Address = args
        .custody
        .parse()
        .with_context(|| format!("invalid custody address: {}", args.custody))?;

    tracing::info!(
        rpc_port = args.rpc_port,
        chain_id = args.chain_id,
        %owner,
        %custody,
        "starting haven-node"
    );

    let registry = VaultRegistry::new(custody, args.chain_id, owner);
    let app_state = api::AppState {
        version: format!("{} (engine {})", env!("CARGO_PKG_VERSION"), ENGINE_VERSION),
        chain_id: args.chain_id,
        registry: Arc::new(RwLock::new(registry)),
        tokens: Arc::new(RwLock::new(api::TokenBank::new())),
        oracle: Arc::new(RwLock::new(StaticProofVerifier::new())),
    };

    let router = api::create_router(app_state);
    let addr = format!("0.0.0.0:{}", args.rpc_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    tracing::info!("API server listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    tracing::info!("haven-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("haven-node {}", env!("CARGO_PKG_VERSION"));
    println!("engine     {ENGINE_VERSION}");
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
