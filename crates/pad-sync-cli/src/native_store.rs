//! Note store backed by the local filesystem using tokio::fs.

use async_trait::async_trait;
use pad_sync_core::store::{NoteHandle, NoteStore, Result, StoreError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem note store rooted at a vault directory. Note handles are
/// paths relative to the root; traversal outside the root is rejected.
pub struct NativeStore {
    root: PathBuf,
}

impl NativeStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, note: &NoteHandle) -> Result<PathBuf> {
        let relative = Path::new(note.path());
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StoreError::Denied(format!(
                "path escapes the vault: {}",
                note.path()
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn map_io(err: std::io::Error, note: &NoteHandle) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound(note.path().to_string()),
        ErrorKind::PermissionDenied => StoreError::Denied(note.path().to_string()),
        _ => StoreError::Io(err.to_string()),
    }
}

#[async_trait]
impl NoteStore for NativeStore {
    async fn read(&self, note: &NoteHandle) -> Result<String> {
        let path = self.resolve(note)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| map_io(e, note))
    }

    async fn write(&self, note: &NoteHandle, content: &str) -> Result<()> {
        let path = self.resolve(note)?;
        // Only existing notes may be rewritten; note creation belongs to
        // the host editor.
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| map_io(e, note))?
        {
            return Err(StoreError::NotFound(note.path().to_string()));
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| map_io(e, note))
    }
}
