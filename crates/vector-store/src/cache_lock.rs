use crate::error::{CacheError, CacheResult};
use crate::paths::LOCK_FILE_NAME;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Instant;

/// Exclusive advisory lock over one provider's cache directory.
///
/// Serializes writers and pruning across processes sharing the cache. Readers never take it:
/// entries only appear through rename, so a reader sees either nothing or a complete file.
pub(crate) struct CacheWriteLock {
    file: File,
}

impl Drop for CacheWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Blocking acquire; call from `spawn_blocking`.
pub(crate) fn acquire_blocking(dir: &Path) -> CacheResult<CacheWriteLock> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|err| CacheError::Lock(format!("open {}: {err}", path.display())))?;

    let start = Instant::now();
    file.lock_exclusive()
        .map_err(|err| CacheError::Lock(format!("acquire {}: {err}", path.display())))?;
    let waited = start.elapsed();
    if waited.as_millis() > 0 {
        log::debug!("Waited {waited:?} for cache lock {}", path.display());
    }

    Ok(CacheWriteLock { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_is_reacquirable_after_drop() {
        let tmp = TempDir::new().unwrap();
        {
            let _lock = acquire_blocking(tmp.path()).unwrap();
            assert!(tmp.path().join(LOCK_FILE_NAME).exists());
        }
        let _again = acquire_blocking(tmp.path()).unwrap();
    }
}
