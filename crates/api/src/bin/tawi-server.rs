//! The Tawi server: wires the runtime, serves the API, and runs the
//! scheduler and session sweeper until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tawi_action::AfricasTalkingGateway;
use tawi_api::{Runtime, ServerConfig, router, scheduler};
use tawi_session::SessionStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const PORT_FALLBACK_ATTEMPTS: u16 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let gateway = Arc::new(AfricasTalkingGateway::new(
        config.environment,
        config.username.clone(),
        config.api_key.clone(),
    ));
    let runtime = Runtime::new(gateway, config.session_ttl);

    let shutdown = CancellationToken::new();

    // Scheduler ticker.
    tokio::spawn(scheduler::run(runtime.clone(), shutdown.clone()));

    // Session sweeper.
    {
        let runtime = runtime.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let ended = runtime.sessions.sweep().await;
                        if ended > 0 {
                            tracing::debug!(ended, "swept expired sessions");
                        }
                    }
                    () = shutdown.cancelled() => return,
                }
            }
        });
    }

    let listener = bind_with_fallback(config.port).await?;
    tracing::info!(addr = %listener.local_addr()?, "tawi listening");

    let app = router(runtime);
    let signal = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await?;
    Ok(())
}

/// Bind the configured port, walking forward a few ports when it is
/// already taken (common during local development).
async fn bind_with_fallback(port: u16) -> anyhow::Result<TcpListener> {
    for offset in 0..PORT_FALLBACK_ATTEMPTS {
        let candidate = port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], candidate));
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(port = candidate, "configured port busy, using fallback");
                }
                return Ok(listener);
            }
            Err(error) if error.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(error) => return Err(error.into()),
        }
    }
    anyhow::bail!("no free port in {port}..{}", port + PORT_FALLBACK_ATTEMPTS)
}
