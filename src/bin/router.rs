//! Edge router binary: symbol-routing front-end over the shard fleet.

use clap::Parser;
use matchcore_rs::router::{RouterConfig, RouterState, SymbolTable, edge_router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "router", about = "The matching-engine edge router")]
struct Args {
    /// Path to the router's TOML configuration.
    #[arg(long, env = "MATCHCORE_ROUTER_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = RouterConfig::load(&args.config)?;
    let table = Arc::new(SymbolTable::build(&config.shards)?);
    info!(
        shards = config.shards.len(),
        symbols = config.shards.iter().map(|s| s.symbols.len()).sum::<usize>(),
        "routing table built"
    );

    let app = edge_router(RouterState::new(table));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "edge router started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
