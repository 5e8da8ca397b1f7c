// SPDX-License-Identifier: PMPL-1.0-or-later
//! AccountDB API server binary
//!
//! Opens the record store once and serves the HTTP API until Ctrl-C.

use accountdb_api::ApiConfig;
use accountdb_storage::{RecordStore, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store_config = StoreConfig::from_env();
    let config = ApiConfig::from_env();

    // Without its bucket the store is useless; refuse to start.
    let store = match RecordStore::open(store_config.clone()) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(
                path = %store_config.path.display(),
                bucket = %store_config.bucket,
                error = %err,
                "failed to open record store"
            );
            return Err(err.into());
        }
    };

    tracing::info!(
        path = %store_config.path.display(),
        bucket = %store_config.bucket,
        startup = ?store_config.startup,
        "record store ready"
    );

    accountdb_api::serve(config, store).await?;

    tracing::info!("server stopped, record store closed");
    Ok(())
}
