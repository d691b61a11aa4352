use std::fs;

use anyhow::Context;
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::{InMemoryStore, SeedData};

/// Builds the embedded store and loads `SEED_FILE` into it when one is configured.
pub fn build_store(config: &AppConfig) -> anyhow::Result<InMemoryStore> {
    let store = InMemoryStore::from_config(config);
    info!("Slot lock wait limited to {:?}", store.lock_timeout());

    match &config.seed_file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read seed file {}", path))?;
            let seed = SeedData::from_json(&raw)
                .with_context(|| format!("invalid seed file {}", path))?;
            store
                .load_seed(&seed)
                .with_context(|| format!("failed to apply seed file {}", path))?;
            info!("Loaded seed file {}", path);
        }
        None => warn!("SEED_FILE not set, starting with an empty store"),
    }

    Ok(store)
}
