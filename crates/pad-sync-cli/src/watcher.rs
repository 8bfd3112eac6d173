//! Debounced vault watcher mapping filesystem activity on markdown notes
//! onto sync triggers.
//!
//! A headless stand-in for the editor's "note opened" event: whenever a
//! markdown file under the vault changes, the watch loop re-syncs it from
//! its linked pad. Pull itself rewrites the note, which would fire the
//! watcher again, so writes performed by sync are flagged in `EchoGuard`
//! and their echo events consumed.

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use pad_sync_core::NoteHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::error;

/// Tracks notes this process just wrote, so their watcher echoes can be
/// skipped. Flags expire after a short TTL in case an event is dropped.
#[derive(Clone, Default)]
pub struct EchoGuard {
    written: Arc<Mutex<HashMap<String, std::time::Instant>>>,
}

const FLAG_TTL: Duration = Duration::from_secs(5);

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a note as written by sync (call before the write).
    pub fn mark(&self, note: &NoteHandle) {
        self.written
            .lock()
            .unwrap()
            .insert(note.path().to_string(), std::time::Instant::now());
    }

    /// Check and consume the flag; returns true at most once per mark.
    pub fn consume(&self, note: &NoteHandle) -> bool {
        let mut written = self.written.lock().unwrap();
        match written.remove(note.path()) {
            Some(at) => at.elapsed() < FLAG_TTL,
            None => false,
        }
    }
}

/// Watches a vault directory for markdown note changes.
pub struct NoteWatcher {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<NoteHandle>,
}

impl NoteWatcher {
    /// Watch `vault_path` recursively with a 200ms debounce.
    pub fn new(vault_path: PathBuf) -> Result<Self> {
        // Resolve symlinks so event paths line up with the watch root.
        let vault_path = vault_path.canonicalize().unwrap_or(vault_path);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let root = vault_path.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(note) = Self::note_for_event(&event.path, &root) {
                            if event_tx.send(note).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => error!("vault watcher error: {}", e),
            },
        )?;

        debouncer
            .watcher()
            .watch(&vault_path, RecursiveMode::Recursive)?;

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Filter an event path down to a markdown note handle, or None.
    fn note_for_event(path: &Path, root: &Path) -> Option<NoteHandle> {
        let relative = path.strip_prefix(root).ok()?.to_str()?;

        // Hidden files and directories are never notes.
        if relative.starts_with('.') || relative.contains("/.") {
            return None;
        }
        if !relative.ends_with(".md") {
            return None;
        }
        Some(NoteHandle::new(relative))
    }

    /// Next changed note; `None` once the watcher shuts down.
    pub async fn next(&mut self) -> Option<NoteHandle> {
        self.event_rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_visible_markdown_files_become_notes() {
        let root = Path::new("/vault");
        let note = |p: &str| NoteWatcher::note_for_event(Path::new(p), root);

        assert_eq!(note("/vault/a.md"), Some(NoteHandle::new("a.md")));
        assert_eq!(
            note("/vault/sub/deep note.md"),
            Some(NoteHandle::new("sub/deep note.md"))
        );
        assert_eq!(note("/vault/.hidden.md"), None);
        assert_eq!(note("/vault/.git/x.md"), None);
        assert_eq!(note("/vault/image.png"), None);
        assert_eq!(note("/elsewhere/a.md"), None);
    }

    #[test]
    fn echo_guard_consumes_flags_once() {
        let guard = EchoGuard::new();
        let note = NoteHandle::new("a.md");

        assert!(!guard.consume(&note));
        guard.mark(&note);
        assert!(guard.consume(&note));
        assert!(!guard.consume(&note));
    }
}
