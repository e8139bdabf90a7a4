//! Hexlink Relay
//!
//! Routes frames between the peers of each game. Knows nothing about game
//! rules; only `login` is decoded.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hexlink::{network::RelayServer, ServerConfig, VERSION};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();
    info!("Hexlink Relay v{}", VERSION);
    info!("Max connections: {}", config.max_connections);
    info!("Max frame size: {} bytes", config.max_frame_size);

    // Single router task.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(async move {
        let server = RelayServer::bind(config)
            .await
            .context("Failed to bind relay")?;
        let shutdown = server.shutdown_handle();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown.send(());
            }
        });

        server.run().await.context("Relay failed")?;
        info!("Relay stopped");
        Ok::<(), anyhow::Error>(())
    })
}
