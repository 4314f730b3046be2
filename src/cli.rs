use crate::k8s::client::ClientSettings;
use crate::k8s::types::PortFilter;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "jolokia-proxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reverse proxy for Jolokia endpoints exposed by Kubernetes pods", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "VERBOSE", help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        short = 'p',
        long = "port",
        env = "JOLOKIA_PROXY_PORT",
        default_value_t = 8080,
        help = "What port to listen on"
    )]
    pub port: u16,

    #[arg(
        short = 'k',
        long = "kubernetes",
        env = "KUBERNETES_MASTER",
        help = "Kubernetes master URL (inferred from the environment when omitted)"
    )]
    pub kubernetes: Option<String>,

    #[arg(
        short = 'u',
        long = "kubernetes-user",
        env = "KUBERNETES_USER",
        help = "Username to authenticate to Kubernetes master"
    )]
    pub kubernetes_user: Option<String>,

    #[arg(
        short = 'P',
        long = "kubernetes-password",
        env = "KUBERNETES_PASSWORD",
        help = "Password to authenticate to Kubernetes master"
    )]
    pub kubernetes_password: Option<String>,

    #[arg(
        short = 'N',
        long = "kubernetes-namespace",
        env = "KUBERNETES_NAMESPACE",
        help = "The namespace to search by default (all namespaces when omitted)"
    )]
    pub kubernetes_namespace: Option<String>,

    #[arg(
        short = 'j',
        long = "jolokia-port",
        env = "JOLOKIA_PORT",
        value_delimiter = ',',
        default_value = "8778",
        help = "The Jolokia port number"
    )]
    pub jolokia_ports: Vec<u16>,

    #[arg(
        short = 'n',
        long = "jolokia-port-name",
        env = "JOLOKIA_PORT_NAME",
        value_delimiter = ',',
        default_value = "jolokia",
        help = "The Jolokia port name"
    )]
    pub jolokia_port_names: Vec<String>,

    #[arg(
        long = "connect-timeout",
        env = "JOLOKIA_PROXY_CONNECT_TIMEOUT",
        default_value_t = 5,
        help = "Backend connect timeout in seconds"
    )]
    pub connect_timeout_secs: u64,

    #[arg(
        long = "response-timeout",
        env = "JOLOKIA_PROXY_RESPONSE_TIMEOUT",
        default_value_t = 5,
        help = "Backend response header timeout in seconds"
    )]
    pub response_timeout_secs: u64,
}

impl Cli {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            master_url: self.kubernetes.clone(),
            username: self.kubernetes_user.clone(),
            password: self.kubernetes_password.clone(),
            namespace: self.kubernetes_namespace.clone(),
        }
    }

    pub fn port_filter(&self) -> PortFilter {
        PortFilter::new(self.jolokia_ports.clone(), self.jolokia_port_names.clone())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}
