pub mod client;

pub use client::{ConnectionSettings, ws_handler};
