//! Progress events emitted during synchronization

/// Progress event reported by the [`Synchronizer`](crate::Synchronizer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Orphaned manifest entries are being removed
    RemovingOrphans {
        /// Number of entries removed
        count: usize,
    },
    /// A file is about to be hashed
    Hashing {
        /// File name within the target directory
        name: String,
    },
}

impl SyncEvent {
    /// Category label; consecutive events of one category share a heading
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::RemovingOrphans { .. } => "Removing orphans",
            Self::Hashing { .. } => "Generating hash for:",
        }
    }
}

/// Receiver of progress events
pub trait ProgressSink {
    /// Handle one event
    fn on_event(&mut self, event: SyncEvent);
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&mut self, _event: SyncEvent) {}
}

impl ProgressSink for Vec<SyncEvent> {
    fn on_event(&mut self, event: SyncEvent) {
        self.push(event);
    }
}
