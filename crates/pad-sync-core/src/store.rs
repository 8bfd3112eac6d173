//! Note storage abstraction.
//!
//! The host application owns note storage; this crate only reads and
//! rewrites existing notes through the `NoteStore` trait. Implementations:
//! - `InMemoryStore` - for testing
//! - `NativeStore` (in pad-sync-cli) - tokio::fs rooted at a vault directory

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Denied(String),

    #[error("storage I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Stable opaque handle for a note: its vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteHandle(String);

impl NoteHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// File stem of the note: directory components and a trailing `.md`
    /// extension stripped. Used as the pad ID at link time.
    pub fn basename(&self) -> &str {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        name.strip_suffix(".md").unwrap_or(name)
    }
}

impl std::fmt::Display for NoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host-owned note storage. Notes are re-read on every operation; callers
/// never hold a long-lived copy of note content.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Read the note's current raw content.
    async fn read(&self, note: &NoteHandle) -> Result<String>;

    /// Atomically replace the note's full content.
    async fn write(&self, note: &NoteHandle, content: &str) -> Result<()>;
}

/// In-memory note store for testing.
#[derive(Default)]
pub struct InMemoryStore {
    notes: RwLock<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a note, creating or replacing it.
    pub fn insert(&self, note: &NoteHandle, content: &str) {
        self.notes
            .write()
            .unwrap()
            .insert(note.path().to_string(), content.to_string());
    }

    /// Snapshot of a note's content, for assertions.
    pub fn get(&self, note: &NoteHandle) -> Option<String> {
        self.notes.read().unwrap().get(note.path()).cloned()
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn read(&self, note: &NoteHandle) -> Result<String> {
        self.notes
            .read()
            .unwrap()
            .get(note.path())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(note.path().to_string()))
    }

    async fn write(&self, note: &NoteHandle, content: &str) -> Result<()> {
        let mut notes = self.notes.write().unwrap();
        if !notes.contains_key(note.path()) {
            return Err(StoreError::NotFound(note.path().to_string()));
        }
        notes.insert(note.path().to_string(), content.to_string());
        Ok(())
    }
}
