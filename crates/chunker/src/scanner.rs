use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Upper bound on a single document; larger files are skipped.
const MAX_FILE_SIZE_BYTES: u64 = 4 * 1024 * 1024;

/// Finds knowledge-base documents under a root directory
pub struct DocumentScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DocumentScanner {
    pub fn new(root: impl AsRef<Path>, extensions: &[String]) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Scan the tree in file-name order, skipping hidden entries.
    pub fn scan(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !Self::is_hidden(entry));

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("walk error at root")));
                }
                Err(err) => {
                    log::warn!("Failed to read entry: {err}");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.is_document(path) {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > MAX_FILE_SIZE_BYTES {
                    log::warn!(
                        "Skipping large document {} ({} bytes > {})",
                        path.display(),
                        meta.len(),
                        MAX_FILE_SIZE_BYTES
                    );
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        log::debug!("Found {} documents under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| self.extensions.iter().any(|candidate| *candidate == ext))
    }

    fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
    }
}
