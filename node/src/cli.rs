//! # CLI Interface
//!
//! Defines the command-line argument structure for `haven-node` using
//! `clap` derive. Supports two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};

use haven_engine::config::CHAIN_ID_DEVNET;

/// Haven devnet gateway node.
///
/// Embeds one escrow vault registry behind an HTTP API, with an
/// in-memory token bank standing in for real on-chain tokens. For
/// development and integration testing; there is no signature auth.
#[derive(Parser, Debug)]
#[command(
    name = "haven-node",
    about = "Haven escrow vault devnet gateway",
    version,
    propagate_version = true
)]
pub struct HavenNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Haven node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the HTTP API.
    #[arg(long, env = "HAVEN_RPC_PORT", default_value_t = 8640)]
    pub rpc_port: u16,

    /// Chain id the embedded registry reports and resolves verifiers for.
    #[arg(long, env = "HAVEN_CHAIN_ID", default_value_t = CHAIN_ID_DEVNET)]
    pub chain_id: u64,

    /// Hex address of the registry owner (may register verifiers).
    #[arg(
        long,
        env = "HAVEN_OWNER",
        default_value = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
    )]
    pub owner: String,

    /// Hex address of the custody account escrowed value sits under.
    #[arg(
        long,
        env = "HAVEN_CUSTODY",
        default_value = "0xcccccccccccccccccccccccccccccccccccccccc"
    )]
    pub custody: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "HAVEN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
