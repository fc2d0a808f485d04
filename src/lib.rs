// Card code keeper - shared cloud record with a local cache

pub mod cache;
pub mod commands;
pub mod config;
pub mod models;
pub mod remote;
pub mod sanitize;
pub mod server;
pub mod sync;

pub use models::{Card, CardStore, CardType, CardsEnvelope};
pub use sanitize::sanitize;
pub use sync::{SyncController, SyncStatus};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
