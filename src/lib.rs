//! YODO: an ephemeral file-hosting daemon.
//!
//! Files uploaded over HTTP get an unguessable URL that can be downloaded
//! exactly once; the first successful GET deletes the file.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use anyhow::Result;
use config::AppConfig;
use services::{
    disk_store::DiskStore,
    id_generator::{IdGenerator, RandomIds},
    memory_store::MemoryStore,
    object_store::ObjectStore,
};
use std::sync::Arc;

/// Build the store backend selected by the configuration.
///
/// A state directory selects the shared on-disk backend; otherwise objects
/// live in this process only.
pub fn build_store(cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    // Draw one id up front so a missing entropy source stops startup here
    // rather than failing the first upload.
    let probe = RandomIds.generate();
    tracing::debug!(%probe, "entropy source available");

    let store: Arc<dyn ObjectStore> = match &cfg.state_dir {
        Some(dir) => Arc::new(DiskStore::open(dir, cfg.max_upload_size)?),
        None => Arc::new(MemoryStore::new(cfg.max_upload_size)),
    };
    Ok(store)
}
