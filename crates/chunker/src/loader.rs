use crate::chunker::Chunker;
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::scanner::DocumentScanner;
use crate::types::Chunk;
use std::path::Path;

/// Loads the knowledge base into prioritized chunks
#[derive(Debug, Clone)]
pub struct KnowledgeBaseLoader {
    config: LoaderConfig,
}

impl KnowledgeBaseLoader {
    #[must_use]
    pub const fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Read every document under the root and chunk it.
    ///
    /// Unreadable documents are skipped with a warning. A missing root or a tree that yields no
    /// chunks is an error: there is nothing to retrieve from.
    pub fn load(&self) -> Result<Vec<Chunk>> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(LoadError::RootMissing(root.clone()));
        }
        self.config.validate().map_err(LoadError::invalid_config)?;
        let chunker = Chunker::new(self.config.chunker.clone())?;

        let files = DocumentScanner::new(root, &self.config.extensions).scan()?;
        let mut chunks = Vec::new();
        let mut documents = 0usize;

        for file in files {
            let content = match std::fs::read_to_string(&file) {
                Ok(content) => content,
                Err(err) => {
                    log::warn!("Could not load {}: {err}", file.display());
                    continue;
                }
            };
            let rel_path = relative_path(root, &file);
            let priority = self.config.rules.resolve(&rel_path);
            chunks.extend(chunker.chunk_document(&rel_path, &content, priority));
            documents += 1;
        }

        if chunks.is_empty() {
            return Err(LoadError::NoChunks(root.clone()));
        }

        log::info!(
            "Loaded {} chunks from {} documents in {}",
            chunks.len(),
            documents,
            root.display()
        );
        Ok(chunks)
    }
}

fn relative_path(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
