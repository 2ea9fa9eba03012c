//! Filesystem storage backend
//!
//! One file per fingerprint under `<root>/<first two hex chars>/`. Writes go
//! to a per-instance directory under `<root>/tmp/` first and are published
//! with a hard link, which fails if the target exists. That gives
//! create-if-absent semantics without a lock and means a reader never sees a
//! half-written file.
//!
//! ```text
//! <root>/
//!   tmp/<instance>/      in-progress writes of one open storage
//!   3f/3fa4...e1.bin     one entry
//! ```
//!
//! An entry file is a big-endian `u32` header length, the entry origin as
//! JSON, then the payload bytes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zrata_core::storage::{check_existing, CacheStorage};
use zrata_domain::{CacheEntry, CacheError, EntryMetadata, EntryOrigin, Fingerprint, Result};

use crate::errors::to_cache_error;

const ENTRY_EXTENSION: &str = "bin";
const TMP_DIR: &str = "tmp";
const HEADER_LEN_BYTES: usize = 4;

/// Temp files untouched for this long belong to a writer that is gone
pub const TEMP_GRACE: Duration = Duration::from_secs(60 * 60);

/// Directory-backed cache storage
///
/// Several instances, in one process or many, may share a root.
#[derive(Debug, Clone)]
pub struct FsCacheStorage {
    root: PathBuf,
    tmp_dir: PathBuf,
}

impl FsCacheStorage {
    /// Open `root`, creating it if needed and sweeping temp files older than
    /// [`TEMP_GRACE`]
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let tmp_dir = root.join(TMP_DIR).join(Uuid::new_v4().to_string());
        fs::create_dir_all(&tmp_dir).await.map_err(to_cache_error)?;

        let swept = sweep_stale(&root.join(TMP_DIR), &tmp_dir, TEMP_GRACE).await?;
        if swept > 0 {
            warn!(root = %root.display(), swept, "Removed temp files left by interrupted writes");
        }
        info!(root = %root.display(), "filesystem cache storage opened");
        Ok(Self { root, tmp_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let hex = fingerprint.as_str();
        self.root.join(&hex[..2]).join(format!("{hex}.{ENTRY_EXTENSION}"))
    }

    async fn read_entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(fingerprint);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(to_cache_error(e)),
        };
        let (origin, payload) = decode_entry(&path, bytes)?;
        let created_at = modified_at(&path).await?;
        Ok(Some(CacheEntry::with_created_at(fingerprint.clone(), origin, payload, created_at)))
    }

    async fn write_temp(&self, contents: &[u8]) -> Result<PathBuf> {
        // Another instance may have swept our directory after a long idle spell
        fs::create_dir_all(&self.tmp_dir).await.map_err(to_cache_error)?;
        let temp_path = self.tmp_dir.join(format!("{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await.map_err(to_cache_error)?;
        file.write_all(contents).await.map_err(to_cache_error)?;
        file.sync_all().await.map_err(to_cache_error)?;
        Ok(temp_path)
    }

    async fn publish(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
        temp_path: &Path,
    ) -> Result<CacheEntry> {
        let final_path = self.entry_path(fingerprint);
        if let Some(shard) = final_path.parent() {
            fs::create_dir_all(shard).await.map_err(to_cache_error)?;
        }

        match fs::hard_link(temp_path, &final_path).await {
            Ok(()) => {
                let created_at = modified_at(&final_path).await?;
                Ok(CacheEntry::with_created_at(fingerprint.clone(), origin.clone(), payload, created_at))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = self
                    .read_entry(fingerprint)
                    .await?
                    .ok_or_else(|| CacheError::storage_transient("entry removed during write"))?;
                check_existing(existing, fingerprint, origin, &payload)
            }
            Err(e) => Err(to_cache_error(e)),
        }
    }

    /// Metadata from the header only; the payload is never read
    async fn read_metadata(&self, path: &Path, fingerprint: Fingerprint) -> Result<Option<EntryMetadata>> {
        let mut file = match fs::File::open(path).await {
            Ok(file) => file,
            // Deleted between read_dir and open
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(to_cache_error(e)),
        };
        let metadata = file.metadata().await.map_err(to_cache_error)?;

        let mut len_bytes = [0_u8; HEADER_LEN_BYTES];
        file.read_exact(&mut len_bytes).await.map_err(|e| corrupt(path, e))?;
        let header_len = u32::from_be_bytes(len_bytes) as usize;
        if (HEADER_LEN_BYTES + header_len) as u64 > metadata.len() {
            return Err(corrupt(path, "header longer than file"));
        }
        let mut header = vec![0_u8; header_len];
        file.read_exact(&mut header).await.map_err(|e| corrupt(path, e))?;
        let origin: EntryOrigin = serde_json::from_slice(&header).map_err(|e| corrupt(path, e))?;

        let size_bytes = metadata.len().saturating_sub((HEADER_LEN_BYTES + header_len) as u64);
        Ok(Some(EntryMetadata {
            fingerprint,
            origin,
            created_at: metadata.modified().map_err(to_cache_error)?.into(),
            size_bytes,
        }))
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        fs::try_exists(self.entry_path(fingerprint)).await.map_err(to_cache_error)
    }

    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    async fn get(&self, fingerprint: &Fingerprint) -> Result<CacheEntry> {
        self.read_entry(fingerprint)
            .await?
            .ok_or_else(|| CacheError::NotFound(fingerprint.clone()))
    }

    #[instrument(
        level = "debug",
        skip(self, origin, payload),
        fields(fingerprint = %fingerprint, size_bytes = payload.len())
    )]
    async fn put(
        &self,
        fingerprint: &Fingerprint,
        origin: &EntryOrigin,
        payload: Vec<u8>,
    ) -> Result<CacheEntry> {
        let contents = encode_entry(origin, &payload)?;
        let temp_path = self.write_temp(&contents).await?;
        let result = self.publish(fingerprint, origin, payload, &temp_path).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            debug!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
        }
        result
    }

    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<bool> {
        match fs::remove_file(self.entry_path(fingerprint)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(to_cache_error(e)),
        }
    }

    async fn list_entries(&self) -> Result<Vec<EntryMetadata>> {
        let mut entries = Vec::new();
        let mut shards = fs::read_dir(&self.root).await.map_err(to_cache_error)?;

        while let Some(shard) = shards.next_entry().await.map_err(to_cache_error)? {
            if shard.file_name() == TMP_DIR || !shard.file_type().await.map_err(to_cache_error)?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await.map_err(to_cache_error)?;
            while let Some(file) = files.next_entry().await.map_err(to_cache_error)? {
                let path = file.path();
                let Some(fingerprint) = fingerprint_from_path(&path) else {
                    continue;
                };
                match self.read_metadata(&path, fingerprint).await {
                    Ok(Some(metadata)) => entries.push(metadata),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Skipping unreadable entry file");
                    }
                }
            }
        }

        entries.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        Ok(entries)
    }

    #[instrument(level = "debug", skip(self))]
    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in self.list_entries().await? {
            if self.delete(&entry.fingerprint).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

fn encode_entry(origin: &EntryOrigin, payload: &[u8]) -> Result<Vec<u8>> {
    let header = serde_json::to_vec(origin)?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| CacheError::serialization("entry origin header too large"))?;
    let mut contents = Vec::with_capacity(HEADER_LEN_BYTES + header.len() + payload.len());
    contents.extend_from_slice(&header_len.to_be_bytes());
    contents.extend_from_slice(&header);
    contents.extend_from_slice(payload);
    Ok(contents)
}

fn decode_entry(path: &Path, mut bytes: Vec<u8>) -> Result<(EntryOrigin, Vec<u8>)> {
    let header_end = bytes
        .get(..HEADER_LEN_BYTES)
        .and_then(|len| <[u8; HEADER_LEN_BYTES]>::try_from(len).ok())
        .map(|len| HEADER_LEN_BYTES + u32::from_be_bytes(len) as usize)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| corrupt(path, "truncated header"))?;
    let origin = serde_json::from_slice(&bytes[HEADER_LEN_BYTES..header_end])
        .map_err(|e| corrupt(path, e))?;
    let payload = bytes.split_off(header_end);
    Ok((origin, payload))
}

fn corrupt(path: &Path, cause: impl std::fmt::Display) -> CacheError {
    CacheError::storage(format!("entry file {} is corrupt: {cause}", path.display()))
}

fn fingerprint_from_path(path: &Path) -> Option<Fingerprint> {
    if path.extension()? != ENTRY_EXTENSION {
        return None;
    }
    Fingerprint::parse(path.file_stem()?.to_str()?).ok()
}

async fn modified_at(path: &Path) -> Result<DateTime<Utc>> {
    let metadata = fs::metadata(path).await.map_err(to_cache_error)?;
    Ok(metadata.modified().map_err(to_cache_error)?.into())
}

/// Remove everything under `tmp_root` not modified within `grace`, except
/// `own`
async fn sweep_stale(tmp_root: &Path, own: &Path, grace: Duration) -> Result<usize> {
    let cutoff = SystemTime::now().checked_sub(grace).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut swept = 0;
    let mut children = fs::read_dir(tmp_root).await.map_err(to_cache_error)?;
    while let Some(child) = children.next_entry().await.map_err(to_cache_error)? {
        let path = child.path();
        if path == own {
            continue;
        }
        let Ok(metadata) = child.metadata().await else {
            continue;
        };
        let stale = metadata.modified().map(|modified| modified < cutoff).unwrap_or(false);
        if !stale {
            continue;
        }
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        match removed {
            Ok(()) => swept += 1,
            Err(e) => debug!(path = %path.display(), error = %e, "Failed to sweep temp path"),
        }
    }
    Ok(swept)
}
