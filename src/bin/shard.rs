//! Shard binary: one matching core plus its HTTP and metrics listeners.

use clap::Parser;
use matchcore_rs::publish::{EventPublisher, NatsEventPublisher, NullPublisher};
use matchcore_rs::shard::{ShardConfig, metrics_router, shard_router, start_shard};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "shard", about = "A matching-engine shard")]
struct Args {
    /// Path to the shard's TOML configuration.
    #[arg(long, env = "MATCHCORE_SHARD_CONFIG")]
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
    let config = ShardConfig::load(&args.config)?;

    let publisher: Arc<dyn EventPublisher> = match &config.broker_bootstrap {
        Some(bootstrap) => {
            let client = async_nats::connect(bootstrap).await?;
            info!(%bootstrap, "connected to event broker");
            Arc::new(NatsEventPublisher::new(client))
        }
        None => {
            warn!("no broker_bootstrap configured; outbound publication disabled");
            Arc::new(NullPublisher::new())
        }
    };

    let handle = start_shard(&config, publisher)?;

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let metrics_app = metrics_router(Arc::clone(&handle.metrics));
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(listener) => {
                info!(%metrics_addr, "metrics listener started");
                if let Err(e) = axum::serve(listener, metrics_app).await {
                    error!(error = %e, "metrics listener failed");
                }
            }
            Err(e) => error!(error = %e, "cannot bind metrics listener"),
        }
    });

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let app = shard_router(handle.http_state());
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    info!(%http_addr, shard = handle.shard_id(), "order listener started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    let _ = tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
