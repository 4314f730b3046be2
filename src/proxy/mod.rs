pub mod handler;
pub mod server;

pub use server::{AppState, ProxyServer};
