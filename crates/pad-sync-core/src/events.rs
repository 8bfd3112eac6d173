//! User-facing notifications emitted by the sync engine.
//!
//! Every remote or storage failure surfaces here as a non-fatal event
//! rather than an uncaught fault; hosts plug in their own `Notifier` to
//! show these to the user.

use tracing::{info, warn};

/// Outcome of a sync transition, suitable for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A new pad was created and linked to the note.
    PadCreated { note: String, pad_id: String },
    /// The note's body was overwritten with the pad's current content.
    PullCompleted { note: String, pad_id: String },
    /// A transition failed; the note was left untouched.
    SyncFailed { note: String, reason: String },
}

/// Sink for sync events. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &SyncEvent);
}

/// Default notifier routing events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &SyncEvent) {
        match event {
            SyncEvent::PadCreated { note, pad_id } => {
                info!(note = %note, pad_id = %pad_id, "note linked to new pad");
            }
            SyncEvent::PullCompleted { note, pad_id } => {
                info!(note = %note, pad_id = %pad_id, "note updated from pad");
            }
            SyncEvent::SyncFailed { note, reason } => {
                warn!(note = %note, reason = %reason, "sync failed");
            }
        }
    }
}
