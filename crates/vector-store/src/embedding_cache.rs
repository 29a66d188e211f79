use crate::cache_lock;
use crate::error::{CacheError, CacheResult};
use crate::fingerprint::Fingerprint;
use crate::paths::{entry_file_name, is_entry_file, safe_component};
use crate::types::CacheEntry;
use kb_chunker::Chunk;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MAX_ENTRIES: usize = 4;
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize)]
struct PersistedEntryRef<'a> {
    schema_version: u32,
    fingerprint: &'a Fingerprint,
    provider_id: &'a str,
    dimension: usize,
    chunks: &'a [Chunk],
    vectors: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct PersistedEntry {
    schema_version: u32,
    fingerprint: Fingerprint,
    provider_id: String,
    dimension: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

/// Persistent embeddings keyed by provider id and chunk-set fingerprint.
///
/// Layout: `<base_dir>/<provider_id>/embeddings_<fingerprint>.json`. Entries are written to a
/// temp file and renamed into place, so readers never observe a partial entry.
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    base_dir: PathBuf,
    provider_id: String,
    max_entries: usize,
    io_timeout: Duration,
}

impl EmbeddingCache {
    pub fn new(base_dir: impl Into<PathBuf>, provider_id: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            provider_id: provider_id.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// `0` disables pruning
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    #[must_use]
    pub const fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    #[must_use]
    pub fn provider_dir(&self) -> PathBuf {
        self.base_dir.join(safe_component(&self.provider_id))
    }

    #[must_use]
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.provider_dir()
            .join(entry_file_name(fingerprint.as_str()))
    }

    /// Load the entry for `fingerprint`.
    ///
    /// `Ok(None)` when absent. Undecodable files and entries that do not match the requested
    /// fingerprint or provider come back as [`CacheError::Corrupt`].
    pub async fn load(&self, fingerprint: &Fingerprint) -> CacheResult<Option<CacheEntry>> {
        let path = self.entry_path(fingerprint);
        let expected = fingerprint.clone();
        let provider_id = self.provider_id.clone();

        let task = tokio::task::spawn_blocking(move || read_entry(&path, &expected, &provider_id));
        let entry = self.with_timeout(task).await?.map_err(join_error)??;
        if let Some(entry) = &entry {
            log::debug!(
                "Embedding cache hit {} ({} chunks)",
                entry.fingerprint.short(),
                entry.len()
            );
        }
        Ok(entry)
    }

    /// Persist `entry` atomically, then prune older entries for this provider.
    pub async fn store(&self, entry: &CacheEntry) -> CacheResult<PathBuf> {
        let bytes = serde_json::to_vec(&PersistedEntryRef {
            schema_version: SCHEMA_VERSION,
            fingerprint: &entry.fingerprint,
            provider_id: &self.provider_id,
            dimension: entry.dimension().unwrap_or(0),
            chunks: &entry.chunks,
            vectors: &entry.vectors,
        })?;
        let dir = self.provider_dir();
        let path = self.entry_path(&entry.fingerprint);
        let max_entries = self.max_entries;

        let task = tokio::task::spawn_blocking(move || -> CacheResult<PathBuf> {
            std::fs::create_dir_all(&dir)?;
            let _lock = cache_lock::acquire_blocking(&dir)?;
            write_atomic(&path, &bytes)?;
            let removed = prune_dir(&dir, max_entries, &path);
            if removed > 0 {
                log::debug!("Pruned {removed} stale embedding cache entries in {}", dir.display());
            }
            Ok(path)
        });
        let path = self.with_timeout(task).await?.map_err(join_error)??;
        log::info!("Stored embedding cache entry {}", path.display());
        Ok(path)
    }

    /// Entry files currently on disk for this provider, newest first
    #[must_use]
    pub fn entries(&self) -> Vec<PathBuf> {
        list_entries(&self.provider_dir())
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    async fn with_timeout<F: std::future::Future>(&self, fut: F) -> CacheResult<F::Output> {
        tokio::time::timeout(self.io_timeout, fut)
            .await
            .map_err(|_| CacheError::Timeout(self.io_timeout))
    }
}

fn join_error(err: tokio::task::JoinError) -> CacheError {
    CacheError::Io(std::io::Error::other(format!("cache task failed: {err}")))
}

fn read_entry(
    path: &Path,
    expected: &Fingerprint,
    provider_id: &str,
) -> CacheResult<Option<CacheEntry>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    decode_entry(path, &bytes, expected, provider_id).map(Some)
}

fn decode_entry(
    path: &Path,
    bytes: &[u8],
    expected: &Fingerprint,
    provider_id: &str,
) -> CacheResult<CacheEntry> {
    let persisted: PersistedEntry = serde_json::from_slice(bytes)
        .map_err(|err| CacheError::corrupt(path, format!("undecodable: {err}")))?;

    if persisted.schema_version != SCHEMA_VERSION {
        return Err(CacheError::corrupt(
            path,
            format!("schema version {} (expected {SCHEMA_VERSION})", persisted.schema_version),
        ));
    }
    if persisted.provider_id != provider_id {
        return Err(CacheError::corrupt(
            path,
            format!("written by provider {}", persisted.provider_id),
        ));
    }
    if &persisted.fingerprint != expected || &Fingerprint::of(&persisted.chunks) != expected {
        return Err(CacheError::corrupt(path, "fingerprint mismatch"));
    }
    if persisted.chunks.len() != persisted.vectors.len() {
        return Err(CacheError::corrupt(
            path,
            format!(
                "{} chunks but {} vectors",
                persisted.chunks.len(),
                persisted.vectors.len()
            ),
        ));
    }
    if let Some(position) = persisted
        .vectors
        .iter()
        .position(|v| v.len() != persisted.dimension)
    {
        return Err(CacheError::corrupt(
            path,
            format!("vector {position} does not have dimension {}", persisted.dimension),
        ));
    }

    Ok(CacheEntry {
        fingerprint: persisted.fingerprint,
        chunks: persisted.chunks,
        vectors: persisted.vectors,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("entry");
    let tmp = path.with_file_name(format!(
        "{name}.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    if let Err(err) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn list_entries(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<(PathBuf, SystemTime)> = read_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_entry_file(path))
        .map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (path, modified)
        })
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

/// Keep at most `max_entries` entries, newest first, never removing `keep`.
fn prune_dir(dir: &Path, max_entries: usize, keep: &Path) -> usize {
    if max_entries == 0 {
        return 0;
    }
    let others: Vec<PathBuf> = list_entries(dir)
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| path != keep)
        .collect();
    let budget = max_entries.saturating_sub(1);

    let mut removed = 0;
    for path in others.into_iter().skip(budget) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => log::warn!("Failed to prune {}: {err}", path.display()),
        }
    }
    removed
}
