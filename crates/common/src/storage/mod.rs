//! Attachment file storage
//!
//! Files are keyed by a relative path of the form `{idea_id}_{filename}`.
//! The database only stores that path; bytes live behind a [`FileStore`].

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};
use tokio::fs;
use tracing::debug;

/// Byte storage for attachment files
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `content` under `path`, replacing any previous file
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Read a file; `None` when it does not exist
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a file; removing a missing file succeeds
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Files under a directory on the local file system
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    /// Create the store, making the directory if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let base_path = dir.into();
        fs::create_dir_all(&base_path).await.map_err(|e| AppError::Storage {
            message: format!("Cannot create upload directory {}: {}", base_path.display(), e),
        })?;

        Ok(Self { base_path })
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        // Stored paths are flat names produced by `storage_path`
        if path.is_empty() || path.contains(['/', '\\']) || path.starts_with('.') {
            return Err(AppError::Storage {
                message: format!("Refusing unsafe storage path: {:?}", path),
            });
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.full_path(path)?;
        fs::write(&full, content).await?;
        debug!(path = %full.display(), bytes = content.len(), "Wrote attachment file");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.full_path(path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.full_path(path)?;
        Ok(fs::try_exists(&full).await? && full.is_file())
    }
}

/// In-memory store for tests; individual operations can be made to fail
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing: Arc<RwLock<Vec<String>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes and deletes of `path` fail
    pub fn fail_on(&self, path: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.push(path.to_string());
        }
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    fn check(&self, path: &str) -> Result<()> {
        let failing = self.failing.read().map(|f| f.iter().any(|p| p == path)).unwrap_or(false);
        if failing {
            return Err(AppError::Storage {
                message: format!("Simulated failure for {}", path),
            });
        }
        Ok(())
    }

    fn poisoned() -> AppError {
        AppError::Storage {
            message: "Memory store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        self.check(path)?;
        self.files
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.read().map_err(|_| Self::poisoned())?.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check(path)?;
        self.files.write().map_err(|_| Self::poisoned())?.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().map_err(|_| Self::poisoned())?.contains_key(path))
    }
}

fn unsafe_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("valid filename pattern"))
}

/// Reduce a client-supplied filename to a safe ASCII name.
///
/// Path separators and whitespace become `_`, anything outside
/// `[A-Za-z0-9_.-]` is dropped, and leading/trailing dots and underscores
/// are stripped. An empty result becomes `file`.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = unsafe_chars().replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Storage key of an attachment
pub fn storage_path(idea_id: i32, filename: &str) -> String {
    format!("{}_{}", idea_id, sanitize_filename(filename))
}

/// Case-insensitive extension check against the configured list
pub fn is_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            allowed.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        }
        _ => false,
    }
}
