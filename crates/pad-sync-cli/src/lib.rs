//! pad-sync-cli: command-line host for the pad sync engine.
//!
//! Provides the native filesystem note store, persisted server settings,
//! and a vault watcher that maps file changes onto sync triggers.

pub mod native_store;
pub mod settings;
pub mod watcher;

pub use native_store::NativeStore;
pub use watcher::{EchoGuard, NoteWatcher};
