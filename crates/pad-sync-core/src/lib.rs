//! pad-sync-core: Keeps local markdown notes linked to remote
//! collaboratively-edited pads.
//!
//! This crate provides the core functionality for:
//! - Parsing/serializing notes with a YAML frontmatter metadata block
//! - A thin client for the pad backend's HTTP API
//! - Converting the backend's rendered HTML into note markup
//! - The sync engine deciding when to create, pull, or resolve a pad
//!
//! Note storage and user notification are trait seams (`NoteStore`,
//! `Notifier`) owned by the host; this crate never creates or deletes
//! notes, only rewrites existing ones.

pub mod config;
pub mod convert;
pub mod engine;
pub mod events;
pub mod frontmatter;
pub mod gateway;
pub mod store;

pub use config::PadConfig;
pub use convert::{EtherpadHtmlConverter, MarkupConverter};
pub use engine::{GatewayFactory, LinkReport, PullReport, SyncEngine, SyncError};
pub use events::{LogNotifier, Notifier, SyncEvent};
pub use gateway::{EtherpadClient, GatewayError, PadGateway, pad_url};
pub use store::{InMemoryStore, NoteHandle, NoteStore, StoreError};
