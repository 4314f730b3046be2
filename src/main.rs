use clap::error::ErrorKind;
use clap::Parser;
use jolokia_proxy::cli::Cli;
use jolokia_proxy::k8s::{DiscoveryWatcher, K8sClient};
use jolokia_proxy::metrics::ProxyMetrics;
use jolokia_proxy::proxy::ProxyServer;
use jolokia_proxy::registry::TargetRegistry;
use jolokia_proxy::Result;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout and exit 0; parse failures are
            // reported and exit 1.
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            process::exit(code);
        }
    };

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting jolokia-proxy v{}", jolokia_proxy::VERSION);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Listening on port {}", cli.port);
    match &cli.kubernetes {
        Some(url) => info!("Using Kubernetes master at {}", url),
        None => info!("Inferring Kubernetes configuration from the environment"),
    }
    if let (Some(user), Some(_)) = (&cli.kubernetes_user, &cli.kubernetes_password) {
        info!("Authenticating to Kubernetes with {}:********", user);
    }
    info!("Possible Jolokia ports: {:?}", cli.jolokia_ports);
    info!("Possible Jolokia port names: {:?}", cli.jolokia_port_names);

    let k8s = K8sClient::connect(&cli.client_settings()).await?;

    // Startup smoke call; a transient API blip must not stop the proxy.
    match k8s.server_version().await {
        Ok(version) => info!("Kubernetes server version: {}", version),
        Err(e) => warn!("Could not retrieve server version: {}", e),
    }

    let registry = Arc::new(TargetRegistry::new());
    let metrics = Arc::new(ProxyMetrics::new()?);

    let watcher = DiscoveryWatcher::new(
        k8s.pods(cli.kubernetes_namespace.as_deref()),
        cli.port_filter(),
        registry.clone(),
        metrics.clone(),
    );
    let watcher_task = tokio::spawn(async move { watcher.run().await });

    let server = ProxyServer::new(
        cli.port,
        registry,
        metrics,
        cli.connect_timeout(),
        cli.response_timeout(),
    )?;
    server.run(shutdown_signal(), SHUTDOWN_GRACE).await?;

    watcher_task.abort();
    info!("jolokia-proxy stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
