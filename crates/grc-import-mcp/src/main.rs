//! MCP server for compliance imports.
//!
//! This server holds one import session and exposes loading, review, linking
//! and commit as tools over the Model Context Protocol.

mod server;
mod state;
mod tools;

use std::path::PathBuf;

use anyhow::{Context, Result};
use rmcp::{ServiceExt, transport::stdio};
use server::GrcMcpServer;
use state::ServerState;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let root = PathBuf::from(std::env::var("GRC_ROOT").unwrap_or_else(|_| ".".to_string()));
    if !root.is_dir() {
        anyhow::bail!("GRC_ROOT '{}' is not a directory", root.display());
    }

    let state = ServerState::from_root(&root)
        .with_context(|| format!("failed to configure importer from {}", root.display()))?;
    tracing::info!(
        store = state.config.store_url().unwrap_or_default(),
        "Persistence service configured"
    );

    let server = GrcMcpServer::new(state);

    tracing::info!("Starting MCP server over stdio");
    let service = server.serve(stdio()).await?;
    let quit_reason = service.waiting().await?;
    tracing::info!("Server stopped: {:?}", quit_reason);

    Ok(())
}
