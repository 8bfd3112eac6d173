//! The sync engine: a small state machine over a note.
//!
//! A note is `Unlinked` until its frontmatter carries a `remoteId`, after
//! which it is `Linked` to exactly one remote pad. Three transitions exist:
//! link (create a pad from the note body), pull (overwrite the note body
//! with the pad's converted content, last-write-wins), and resolve-for-view
//! (derive the pad's public URL without touching the note).
//!
//! Every transition re-reads the note from storage first; nothing is cached
//! across operations, so external edits between operations are always the
//! base state. The gateway is rebuilt from the supplied configuration on
//! every transition for the same reason.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use crate::config::PadConfig;
use crate::convert::MarkupConverter;
use crate::events::{LogNotifier, Notifier, SyncEvent};
use crate::frontmatter::{self, Frontmatter, FrontmatterError, LAST_SYNCED_KEY, REMOTE_ID_KEY};
use crate::gateway::{GatewayError, PadGateway, pad_url};
use crate::store::{NoteHandle, NoteStore, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("note '{note}' is already linked to pad '{pad_id}'")]
    AlreadyLinked { note: String, pad_id: String },

    #[error(transparent)]
    Remote(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Metadata(#[from] FrontmatterError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Factory producing a gateway from the current configuration. Invoked
/// fresh on every transition; no connection state survives between calls.
pub type GatewayFactory = Box<dyn Fn(&PadConfig) -> Box<dyn PadGateway> + Send + Sync>;

/// Outcome of a successful link transition.
#[derive(Debug, Clone)]
pub struct LinkReport {
    pub pad_id: String,
    /// Public URL of the freshly created pad.
    pub url: String,
}

/// Outcome of a pull transition.
#[derive(Debug, Clone)]
pub enum PullReport {
    /// The note has no `remoteId`; nothing was done. Opening an unlinked
    /// note must never error, so this is a result, not a failure.
    NotLinked,
    /// The note body was overwritten with the pad's converted content.
    Updated {
        pad_id: String,
        synced_at: DateTime<Utc>,
    },
}

pub struct SyncEngine<S: NoteStore> {
    store: S,
    converter: Box<dyn MarkupConverter>,
    make_gateway: GatewayFactory,
    notifier: Box<dyn Notifier>,
}

impl<S: NoteStore> SyncEngine<S> {
    pub fn new(
        store: S,
        converter: impl MarkupConverter + 'static,
        make_gateway: GatewayFactory,
    ) -> Self {
        Self {
            store,
            converter: Box::new(converter),
            make_gateway,
            notifier: Box::new(LogNotifier),
        }
    }

    /// Replace the default log-based notifier.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Link transition: create a remote pad named after the note's basename,
    /// seeded with the note's metadata-free body, then record the link in
    /// the note's frontmatter.
    ///
    /// The note is written only after the remote confirms creation; on any
    /// failure the note is left byte-identical.
    pub async fn link(&self, note: &NoteHandle, config: &PadConfig) -> Result<LinkReport> {
        let raw = self.store.read(note).await?;
        let metadata = frontmatter::extract(&raw);

        if let Some(pad_id) = remote_id(metadata.as_ref()) {
            return Err(SyncError::AlreadyLinked {
                note: note.path().to_string(),
                pad_id,
            });
        }

        let pad_id = note.basename().to_string();
        let body = frontmatter::body(&raw);

        let gateway = (self.make_gateway)(config);
        gateway.create_pad(&pad_id, body).await?;

        let mut updates = Frontmatter::new();
        updates.insert(REMOTE_ID_KEY.to_string(), JsonValue::String(pad_id.clone()));
        let merged = frontmatter::merge(metadata.as_ref(), updates);
        let rebuilt = frontmatter::compose(&merged, body)?;
        self.store.write(note, &rebuilt).await?;

        self.notifier.notify(&SyncEvent::PadCreated {
            note: note.path().to_string(),
            pad_id: pad_id.clone(),
        });

        let url = pad_url(config, &pad_id);
        Ok(LinkReport { pad_id, url })
    }

    /// Pull transition: overwrite the note's body with the linked pad's
    /// converted content and stamp `lastSyncedAt`.
    ///
    /// Last-write-wins: unsynced local edits to the body are discarded.
    /// Unlinked notes are a silent no-op; any failure leaves the note
    /// unchanged.
    pub async fn pull(&self, note: &NoteHandle, config: &PadConfig) -> Result<PullReport> {
        let raw = self.store.read(note).await?;
        let metadata = frontmatter::extract(&raw);

        let Some(pad_id) = remote_id(metadata.as_ref()) else {
            debug!(note = note.path(), "note has no pad link, skipping pull");
            return Ok(PullReport::NotLinked);
        };

        let gateway = (self.make_gateway)(config);
        let rendered = gateway.fetch_rendered(&pad_id).await?;
        let markup = self.converter.to_markup(&rendered);

        let synced_at = Utc::now();
        let mut updates = Frontmatter::new();
        updates.insert(
            LAST_SYNCED_KEY.to_string(),
            JsonValue::String(synced_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        let merged = frontmatter::merge(metadata.as_ref(), updates);
        let rebuilt = frontmatter::compose(&merged, &markup)?;
        self.store.write(note, &rebuilt).await?;

        self.notifier.notify(&SyncEvent::PullCompleted {
            note: note.path().to_string(),
            pad_id: pad_id.clone(),
        });

        Ok(PullReport::Updated { pad_id, synced_at })
    }

    /// Resolve-for-view: the public URL of the linked pad, or `None` when
    /// the note is unlinked. Never mutates the note.
    pub async fn resolve_view_url(
        &self,
        note: &NoteHandle,
        config: &PadConfig,
    ) -> Result<Option<String>> {
        let raw = self.store.read(note).await?;
        let metadata = frontmatter::extract(&raw);
        Ok(remote_id(metadata.as_ref()).map(|id| pad_url(config, &id)))
    }

    /// Note-open handler: an idempotent, no-op-safe pull. Failures are
    /// reported through the notifier and logged, never propagated, so that
    /// opening a note can never error.
    pub async fn handle_note_opened(&self, note: &NoteHandle, config: &PadConfig) {
        match self.pull(note, config).await {
            Ok(_) => {}
            Err(err) => {
                self.notifier.notify(&SyncEvent::SyncFailed {
                    note: note.path().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }
}

fn remote_id(metadata: Option<&Frontmatter>) -> Option<String> {
    metadata?
        .get(REMOTE_ID_KEY)?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::EtherpadHtmlConverter;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Scripted gateway recording every call and the config it was built
    /// from.
    struct FakeBackend {
        create_response: Mutex<Option<GatewayError>>,
        fetch_response: Mutex<std::result::Result<String, String>>,
        created: Mutex<Vec<(String, String)>>,
        configs_seen: Mutex<Vec<PadConfig>>,
    }

    impl FakeBackend {
        /// Backend where creation succeeds and fetches return `html`.
        fn new_ok(html: &str) -> Arc<Self> {
            Arc::new(Self {
                create_response: Mutex::new(None),
                fetch_response: Mutex::new(Ok(html.to_string())),
                created: Mutex::new(Vec::new()),
                configs_seen: Mutex::new(Vec::new()),
            })
        }

        /// Backend where every operation fails with `reason`.
        fn new_err(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                create_response: Mutex::new(Some(GatewayError::Unreachable(reason.to_string()))),
                fetch_response: Mutex::new(Err(reason.to_string())),
                created: Mutex::new(Vec::new()),
                configs_seen: Mutex::new(Vec::new()),
            })
        }
    }

    struct FakeGateway(Arc<FakeBackend>);

    #[async_trait]
    impl PadGateway for FakeGateway {
        async fn create_pad(
            &self,
            pad_id: &str,
            initial_text: &str,
        ) -> std::result::Result<(), GatewayError> {
            if let Some(err) = self.0.create_response.lock().unwrap().take() {
                return Err(err);
            }
            self.0
                .created
                .lock()
                .unwrap()
                .push((pad_id.to_string(), initial_text.to_string()));
            Ok(())
        }

        async fn fetch_rendered(&self, _pad_id: &str) -> std::result::Result<String, GatewayError> {
            self.0
                .fetch_response
                .lock()
                .unwrap()
                .clone()
                .map_err(GatewayError::Rejected)
        }
    }

    fn engine_with(
        backend: Arc<FakeBackend>,
        store: InMemoryStore,
    ) -> SyncEngine<InMemoryStore> {
        let factory: GatewayFactory = Box::new(move |config| {
            backend.configs_seen.lock().unwrap().push(config.clone());
            Box::new(FakeGateway(Arc::clone(&backend)))
        });
        SyncEngine::new(store, EtherpadHtmlConverter, factory)
    }

    #[tokio::test]
    async fn link_records_remote_id_and_keeps_body() {
        let backend = FakeBackend::new_ok("");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("my note.md");
        store.insert(&note, "Body line one\nBody line two\n");

        let engine = engine_with(Arc::clone(&backend), store);
        let report = engine.link(&note, &PadConfig::default()).await.unwrap();

        assert_eq!(report.pad_id, "my note");
        assert_eq!(report.url, "http://localhost:9001/p/my_note");

        let raw = engine.store().get(&note).unwrap();
        let fm = frontmatter::extract(&raw).unwrap();
        assert_eq!(fm.len(), 1);
        assert_eq!(fm.get(REMOTE_ID_KEY), Some(&json!("my note")));
        assert_eq!(frontmatter::body(&raw), "Body line one\nBody line two\n");

        // The pad was seeded with the metadata-free body
        let created = backend.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].0, "my note");
        assert_eq!(created[0].1, "Body line one\nBody line two\n");
    }

    #[tokio::test]
    async fn link_failure_leaves_note_byte_identical() {
        let backend = FakeBackend::new_ok("");
        *backend.create_response.lock().unwrap() =
            Some(GatewayError::Rejected("padID does already exist".into()));

        let store = InMemoryStore::new();
        let note = NoteHandle::new("taken.md");
        let original = "---\nauthor: me\n---\nBody\n";
        store.insert(&note, original);

        let engine = engine_with(backend, store);
        let err = engine.link(&note, &PadConfig::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(GatewayError::Rejected(_))));
        assert_eq!(engine.store().get(&note).as_deref(), Some(original));
    }

    #[tokio::test]
    async fn link_twice_is_rejected() {
        let backend = FakeBackend::new_ok("");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("linked.md");
        store.insert(&note, "---\nremoteId: linked\n---\nBody");

        let engine = engine_with(backend, store);
        let err = engine.link(&note, &PadConfig::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::AlreadyLinked { .. }));
    }

    #[tokio::test]
    async fn pull_overwrites_body_and_stamps_sync_time() {
        let backend = FakeBackend::new_ok("<!DOCTYPE HTML><html><body>Hello</body></html>");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("abc.md");
        store.insert(&note, "---\nremoteId: abc\nother: 1\n---\nstale local body\n");

        let engine = engine_with(backend, store);
        let report = engine.pull(&note, &PadConfig::default()).await.unwrap();
        assert!(matches!(report, PullReport::Updated { ref pad_id, .. } if pad_id == "abc"));

        let raw = engine.store().get(&note).unwrap();
        let fm = frontmatter::extract(&raw).unwrap();
        assert_eq!(fm.get(REMOTE_ID_KEY), Some(&json!("abc")));
        assert_eq!(fm.get("other"), Some(&json!(1)));
        assert!(fm.get(LAST_SYNCED_KEY).is_some());
        assert_eq!(fm.len(), 3);
        assert_eq!(frontmatter::body(&raw), "Hello");
    }

    #[tokio::test]
    async fn pull_on_unlinked_note_is_a_no_op() {
        let backend = FakeBackend::new_ok("should never be fetched");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("plain.md");
        let original = "---\nauthor: me\n---\nUntouched\n";
        store.insert(&note, original);

        let engine = engine_with(backend, store);
        let report = engine.pull(&note, &PadConfig::default()).await.unwrap();
        assert!(matches!(report, PullReport::NotLinked));
        assert_eq!(engine.store().get(&note).as_deref(), Some(original));
    }

    #[tokio::test]
    async fn pull_failure_leaves_note_unchanged() {
        let backend = FakeBackend::new_err("pad does not exist");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("gone.md");
        let original = "---\nremoteId: gone\n---\nStill here\n";
        store.insert(&note, original);

        let engine = engine_with(backend, store);
        assert!(engine.pull(&note, &PadConfig::default()).await.is_err());
        assert_eq!(engine.store().get(&note).as_deref(), Some(original));
    }

    #[tokio::test]
    async fn open_handler_swallows_failures() {
        let backend = FakeBackend::new_err("unreachable");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("flaky.md");
        store.insert(&note, "---\nremoteId: flaky\n---\nBody");

        let engine = engine_with(backend, store);
        // Must not panic or propagate
        engine.handle_note_opened(&note, &PadConfig::default()).await;
    }

    #[tokio::test]
    async fn view_url_for_linked_and_unlinked_notes() {
        let backend = FakeBackend::new_ok("");
        let store = InMemoryStore::new();
        let linked = NoteHandle::new("linked.md");
        let plain = NoteHandle::new("plain.md");
        store.insert(&linked, "---\nremoteId: my note\n---\nBody");
        store.insert(&plain, "Body only");

        let config = PadConfig {
            host: "x".to_string(),
            port: 9001,
            api_key: String::new(),
        };
        let engine = engine_with(backend, store);
        assert_eq!(
            engine.resolve_view_url(&linked, &config).await.unwrap(),
            Some("http://x:9001/p/my_note".to_string())
        );
        assert_eq!(engine.resolve_view_url(&plain, &config).await.unwrap(), None);
    }

    #[tokio::test]
    async fn gateway_is_rebuilt_from_current_config_each_call() {
        let backend = FakeBackend::new_ok("<body>x</body>");
        let store = InMemoryStore::new();
        let note = NoteHandle::new("n.md");
        store.insert(&note, "---\nremoteId: n\n---\nBody");

        let engine = engine_with(Arc::clone(&backend), store);

        let first = PadConfig::default();
        let second = PadConfig {
            host: "pads.example".to_string(),
            ..PadConfig::default()
        };
        engine.pull(&note, &first).await.unwrap();
        engine.pull(&note, &second).await.unwrap();

        let seen = backend.configs_seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].host, "localhost");
        assert_eq!(seen[1].host, "pads.example");
    }
}
