use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pgedge_rag_server::api;
use pgedge_rag_server::config;
use pgedge_rag_server::pipeline::Manager;

/// Retrieval-Augmented Generation server for PostgreSQL + pgvector.
#[derive(Parser)]
#[command(name = "pgedge-rag-server", version, about)]
struct Cli {
    /// Path to the configuration file. If not specified, searches
    /// /etc/pgedge/pgedge-rag-server.yaml, then pgedge-rag-server.yaml in
    /// the binary's directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output the OpenAPI v3 specification as JSON and exit.
    #[arg(long)]
    openapi: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.openapi {
        println!("{}", serde_json::to_string_pretty(&api::openapi::spec())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load(cli.config.as_deref())?;
    tracing::info!(pipelines = cfg.pipelines.len(), "configuration loaded");

    if cfg.server.tls.enabled {
        // Certificate handling is delegated to a fronting proxy
        anyhow::bail!(
            "in-process TLS termination is not supported; front the server with a TLS proxy"
        );
    }

    let manager = Arc::new(Manager::new(&cfg).await?);
    let app = api::router(manager.clone(), &cfg.server.cors);

    let addr = format!("{}:{}", cfg.server.listen_address, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("received shutdown signal");
}
