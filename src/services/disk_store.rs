//! DiskStore: objects kept as files in a state directory.
//!
//! Lets several worker processes share one set of objects. Each object is two
//! files beneath `base_path`:
//!
//! - `{id}`       — the payload
//! - `{id}.json`  — metadata sidecar
//!
//! `put` writes the payload to a temp file, reserves the id by exclusively
//! creating the sidecar, then renames the temp file onto `{id}`. The rename
//! is the publication point: nothing is visible to `peek` or `take_once`
//! before it.
//!
//! `take_once` claims an object by renaming `{id}` to a private claim path.
//! `rename(2)` moves the source for exactly one caller, in whichever process
//! it runs; every other racer sees `NotFound`.

use crate::{
    models::object::{ObjectMetadata, StoredObject},
    services::{
        id_generator::{IdGenerator, RandomIds},
        object_store::{
            MAX_ID_ATTEMPTS, ObjectStore, StoreError, StoreResult, ensure_within_limit,
        },
    },
};
use anyhow::{Context, bail};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const SIDECAR_EXT: &str = "json";
const TMP_PREFIX: &str = ".tmp-";
const CLAIM_PREFIX: &str = ".taken-";

pub struct DiskStore {
    base_path: PathBuf,
    ids: Box<dyn IdGenerator>,
    max_size: usize,
}

impl DiskStore {
    /// Open a store rooted at `base_path`.
    ///
    /// The directory must already exist and be absolute; anything else is a
    /// startup failure.
    pub fn open(base_path: impl Into<PathBuf>, max_size: usize) -> anyhow::Result<Self> {
        Self::open_with_id_generator(base_path, max_size, RandomIds)
    }

    pub fn open_with_id_generator(
        base_path: impl Into<PathBuf>,
        max_size: usize,
        ids: impl IdGenerator + 'static,
    ) -> anyhow::Result<Self> {
        let base_path = base_path.into();
        if !base_path.is_absolute() {
            bail!("state directory {} is not an absolute path", base_path.display());
        }
        let meta = std::fs::metadata(&base_path)
            .with_context(|| format!("reading state directory {}", base_path.display()))?;
        if !meta.is_dir() {
            bail!("state directory {} is not a directory", base_path.display());
        }

        Ok(Self {
            base_path,
            ids: Box::new(ids),
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn payload_path(&self, id: &Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }

    fn sidecar_path(&self, id: &Uuid) -> PathBuf {
        self.base_path.join(format!("{id}.{SIDECAR_EXT}"))
    }

    fn scratch_path(&self, prefix: &str) -> PathBuf {
        self.base_path.join(format!("{prefix}{}", Uuid::new_v4()))
    }

    /// Write the payload to a fresh temp file and fsync it.
    async fn write_temp_payload(&self, payload: &[u8]) -> StoreResult<PathBuf> {
        let tmp_path = self.scratch_path(TMP_PREFIX);
        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(payload).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(err) = written {
            remove_best_effort(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        Ok(tmp_path)
    }

    /// Reserve `id` by exclusively creating its sidecar.
    ///
    /// Returns `Ok(false)` when the id is already live.
    async fn reserve(&self, id: &Uuid, metadata: &ObjectMetadata) -> StoreResult<bool> {
        let sidecar = self.sidecar_path(id);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&sidecar)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(StoreError::Io(err)),
        };

        let written = async {
            let json = serde_json::to_vec(metadata)?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            Ok::<_, StoreError>(())
        }
        .await;

        if let Err(err) = written {
            remove_best_effort(&sidecar).await;
            return Err(err);
        }
        Ok(true)
    }

    async fn read_metadata(&self, id: &Uuid) -> StoreResult<Option<ObjectMetadata>> {
        match fs::read(self.sidecar_path(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[async_trait]
impl ObjectStore for DiskStore {
    async fn put(
        &self,
        payload: Bytes,
        content_type: Option<String>,
        filename: Option<String>,
    ) -> StoreResult<Uuid> {
        ensure_within_limit(&payload, self.max_size)?;
        let metadata = ObjectMetadata::for_upload(content_type, filename, payload.len() as u64);
        let tmp_path = self.write_temp_payload(&payload).await?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.generate();
            let reserved = match self.reserve(&id, &metadata).await {
                Ok(reserved) => reserved,
                Err(err) => {
                    remove_best_effort(&tmp_path).await;
                    return Err(err);
                }
            };
            if !reserved {
                debug!(%id, "generated id collides with a live object, retrying");
                continue;
            }

            if let Err(err) = fs::rename(&tmp_path, self.payload_path(&id)).await {
                remove_best_effort(&self.sidecar_path(&id)).await;
                remove_best_effort(&tmp_path).await;
                return Err(StoreError::Io(err));
            }

            info!(
                %id,
                size = metadata.size,
                content_type = %metadata.content_type,
                "stored object"
            );
            return Ok(id);
        }

        remove_best_effort(&tmp_path).await;
        Err(StoreError::IdSpaceExhausted)
    }

    async fn peek(&self, id: &Uuid) -> StoreResult<Option<ObjectMetadata>> {
        // A sidecar without its payload is either mid-upload or mid-consume.
        match fs::metadata(self.payload_path(id)).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        }
        self.read_metadata(id).await
    }

    async fn take_once(&self, id: &Uuid) -> StoreResult<Option<StoredObject>> {
        let claim = self.scratch_path(&format!("{CLAIM_PREFIX}{id}-"));
        match fs::rename(self.payload_path(id), &claim).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(%id, "no object to consume");
                return Ok(None);
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        // The claim is ours alone. Whatever happens next, both files go.
        let loaded = async {
            let metadata = self.read_metadata(id).await?;
            let payload = fs::read(&claim).await?;
            Ok::<_, StoreError>((metadata, payload))
        }
        .await;

        remove_best_effort(&claim).await;
        remove_best_effort(&self.sidecar_path(id)).await;

        match loaded? {
            (Some(metadata), payload) => {
                info!(%id, size = metadata.size, "consumed object");
                Ok(Some(StoredObject {
                    id: *id,
                    payload: Bytes::from(payload),
                    metadata,
                }))
            }
            (None, _) => {
                warn!(%id, "payload had no metadata sidecar, discarded");
                Ok(None)
            }
        }
    }

    /// Write, read back and delete a probe file under `base_path`.
    async fn check_ready(&self) -> StoreResult<()> {
        let probe = self.scratch_path(".readyz-");
        fs::write(&probe, b"readyz").await?;
        let read = fs::read(&probe).await;
        remove_best_effort(&probe).await;
        if read? != b"readyz" {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

async fn remove_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove {}: {}", path.display(), err),
    }
}
