use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(String),

    #[error("No backend for pod {name} in namespace {namespace}")]
    BackendNotFound { name: String, namespace: String },

    #[error("Invalid proxy path: {0}")]
    InvalidPath(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream response timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
