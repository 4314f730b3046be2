use crate::{ProxyError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, Config};
use secrecy::SecretString;
use tracing::{debug, info};

/// Cluster connection parameters, passed by value from the CLI.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub master_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: Option<String>,
}

pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Connect using explicit settings; falls back to the inferred
    /// environment configuration (kubeconfig or in-cluster) when no master
    /// URL is given.
    pub async fn connect(settings: &ClientSettings) -> Result<Self> {
        debug!("Initializing Kubernetes client");

        let mut config = match &settings.master_url {
            Some(url) => {
                let cluster_url: http::Uri = url.parse().map_err(|e| {
                    ProxyError::Config(format!("Invalid Kubernetes master URL {}: {}", url, e))
                })?;

                let mut config = Config::new(cluster_url);
                config.auth_info.username = settings.username.clone();
                config.auth_info.password = settings.password.clone().map(SecretString::from);
                config
            }
            None => Config::infer().await.map_err(|e| {
                ProxyError::Config(format!("Could not infer Kubernetes configuration: {}", e))
            })?,
        };

        if let Some(ns) = &settings.namespace {
            config.default_namespace = ns.clone();
        }

        let client = Client::try_from(config).map_err(|e| {
            ProxyError::Kubernetes(format!("Failed to create K8s client: {}", e))
        })?;

        info!("Successfully created Kubernetes client");

        Ok(Self { client })
    }

    pub fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    pub async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await.map_err(|e| {
            ProxyError::Kubernetes(format!("Failed to retrieve server version: {}", e))
        })?;

        Ok(info.git_version)
    }
}
