//! The store contract shared by every backend.
//!
//! A store is the only owner of uploaded objects. It hands out an id on
//! `put`, answers metadata probes with `peek`, and gives the payload to
//! exactly one caller of `take_once`, removing it in the same step.
//!
//! Absence is not an error: unknown and already-consumed ids both come back
//! as `Ok(None)`, and callers cannot tell the two apart.

use crate::models::object::{ObjectMetadata, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;

/// How many fresh ids `put` tries before giving up on a collision streak.
pub const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("failed to allocate URL")]
    IdSpaceExhausted,
    #[error("object metadata is unreadable: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a payload and return its freshly allocated id.
    ///
    /// Fails with `PayloadTooLarge` without storing anything when the payload
    /// exceeds `max_size()`. A missing content type is inferred from the
    /// filename here and never recomputed.
    async fn put(
        &self,
        payload: Bytes,
        content_type: Option<String>,
        filename: Option<String>,
    ) -> StoreResult<Uuid>;

    /// Metadata of a present object. Never consumes it.
    async fn peek(&self, id: &Uuid) -> StoreResult<Option<ObjectMetadata>>;

    /// Remove and return an object. Among concurrent callers for the same id
    /// at most one gets `Some`.
    async fn take_once(&self, id: &Uuid) -> StoreResult<Option<StoredObject>>;

    /// Verify the backend can currently serve requests.
    async fn check_ready(&self) -> StoreResult<()>;

    /// Largest payload `put` accepts, in bytes.
    fn max_size(&self) -> usize;

    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;
}

/// Reject payloads over `limit`.
pub(crate) fn ensure_within_limit(payload: &Bytes, limit: usize) -> StoreResult<()> {
    if payload.len() > limit {
        return Err(StoreError::PayloadTooLarge {
            size: payload.len(),
            limit,
        });
    }
    Ok(())
}
