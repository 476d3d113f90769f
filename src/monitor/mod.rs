//! Read-only HTTP monitoring endpoint

pub mod handlers;
pub mod server;

pub use server::MonitorServer;
