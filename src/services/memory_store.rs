//! In-process object table.
//!
//! One `HashMap` behind a `parking_lot::RwLock`. Probes share the read lock;
//! insertion and removal take the write lock, so the presence check and the
//! removal in `take_once` are a single step. Contents live exactly as long as
//! the process.

use crate::{
    models::object::{ObjectMetadata, StoredObject},
    services::{
        id_generator::{IdGenerator, RandomIds},
        object_store::{
            MAX_ID_ATTEMPTS, ObjectStore, StoreError, StoreResult, ensure_within_limit,
        },
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, hash_map::Entry};
use tracing::{debug, info};
use uuid::Uuid;

pub struct MemoryStore {
    objects: RwLock<HashMap<Uuid, StoredObject>>,
    ids: Box<dyn IdGenerator>,
    max_size: usize,
}

impl MemoryStore {
    pub fn new(max_size: usize) -> Self {
        Self::with_id_generator(max_size, RandomIds)
    }

    pub fn with_id_generator(max_size: usize, ids: impl IdGenerator + 'static) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            ids: Box::new(ids),
            max_size,
        }
    }

    /// Number of objects currently present.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        payload: Bytes,
        content_type: Option<String>,
        filename: Option<String>,
    ) -> StoreResult<Uuid> {
        ensure_within_limit(&payload, self.max_size)?;
        let metadata = ObjectMetadata::for_upload(content_type, filename, payload.len() as u64);

        let mut objects = self.objects.write();
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.generate();
            match objects.entry(id) {
                Entry::Occupied(_) => {
                    debug!(%id, "generated id collides with a live object, retrying");
                }
                Entry::Vacant(slot) => {
                    info!(
                        %id,
                        size = metadata.size,
                        content_type = %metadata.content_type,
                        "stored object"
                    );
                    slot.insert(StoredObject {
                        id,
                        payload,
                        metadata,
                    });
                    return Ok(id);
                }
            }
        }

        Err(StoreError::IdSpaceExhausted)
    }

    async fn peek(&self, id: &Uuid) -> StoreResult<Option<ObjectMetadata>> {
        Ok(self.objects.read().get(id).map(|obj| obj.metadata.clone()))
    }

    async fn take_once(&self, id: &Uuid) -> StoreResult<Option<StoredObject>> {
        let taken = self.objects.write().remove(id);
        match &taken {
            Some(obj) => info!(%id, size = obj.metadata.size, "consumed object"),
            None => debug!(%id, "no object to consume"),
        }
        Ok(taken)
    }

    async fn check_ready(&self) -> StoreResult<()> {
        Ok(())
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
