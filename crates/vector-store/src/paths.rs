use std::path::{Path, PathBuf};

pub const CACHE_DIR_NAME: &str = ".cache";
pub const EMBEDDINGS_DIR_NAME: &str = "embeddings";
pub const ENTRY_PREFIX: &str = "embeddings_";
pub const ENTRY_EXTENSION: &str = "json";
pub const LOCK_FILE_NAME: &str = "cache.lock";

/// `.cache/embeddings` relative to the working directory
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    PathBuf::from(CACHE_DIR_NAME).join(EMBEDDINGS_DIR_NAME)
}

#[must_use]
pub fn entry_file_name(fingerprint: &str) -> String {
    format!("{ENTRY_PREFIX}{fingerprint}.{ENTRY_EXTENSION}")
}

/// True for `embeddings_<fp>.json`; temp files and the lock file are excluded.
#[must_use]
pub fn is_entry_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    name.starts_with(ENTRY_PREFIX)
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// Map an arbitrary id (model names contain `/` and `:`) to one path component
#[must_use]
pub fn safe_component(raw: &str) -> String {
    let out: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.chars().all(|ch| ch == '.') {
        "_".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_component_replaces_separators() {
        assert_eq!(safe_component("gemini/text-embedding-004"), "gemini_text-embedding-004");
        assert_eq!(safe_component(""), "_");
        assert_eq!(safe_component(".."), "_");
    }

    #[test]
    fn entry_files_are_recognized() {
        assert!(is_entry_file(Path::new("x/embeddings_abc.json")));
        assert!(!is_entry_file(Path::new("x/embeddings_abc.json.1.tmp")));
        assert!(!is_entry_file(Path::new("x/cache.lock")));
        assert_eq!(entry_file_name("abc"), "embeddings_abc.json");
    }
}
