// Frameworks layer: configuration and HTTP bootstrap.

pub mod config;
pub mod server;
