//! Lading application: HTTP solver client, configuration and logging.

pub mod client;
pub mod config;
pub mod observability;
