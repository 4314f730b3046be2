use crate::metrics::ProxyMetrics;
use crate::proxy::handler;
use crate::registry::TargetRegistry;
use crate::{ProxyError, Result};
use axum::routing::{any, get};
use axum::Router;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TargetRegistry>,
    pub metrics: Arc<ProxyMetrics>,
    pub client: reqwest::Client,
    pub response_timeout: Duration,
}

pub struct ProxyServer {
    port: u16,
    state: AppState,
}

impl ProxyServer {
    pub fn new(
        port: u16,
        registry: Arc<TargetRegistry>,
        metrics: Arc<ProxyMetrics>,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self> {
        // One shared connection pool; routing still resolves per request, so
        // a replaced backend stops receiving traffic as soon as it leaves the
        // registry.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ProxyError::Config(format!("Failed to build upstream client: {}", e)))?;

        Ok(Self {
            port,
            state: AppState {
                registry,
                metrics,
                client,
                response_timeout,
            },
        })
    }

    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(handler::health))
            .route("/metrics", get(handler::metrics))
            .route("/proxy/{namespace}/{pod}", any(handler::forward))
            .route("/proxy/{namespace}/{pod}/{*rest}", any(handler::forward))
            .with_state(state)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests for at
    /// most `grace` before giving up on them.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
        grace: Duration,
    ) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", addr);

        let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async move {
            shutdown.await;
            let _ = signal_tx.send(());
        };

        let serve = axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(shutdown)
            .into_future();
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => result?,
            _ = async {
                let _ = signal_rx.await;
                tokio::time::sleep(grace).await;
            } => {
                warn!("Shutdown grace period of {:?} expired, dropping in-flight requests", grace);
            }
        }

        Ok(())
    }
}
