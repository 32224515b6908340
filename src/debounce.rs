//! Coalescing of rapid query edits at the event-source boundary.
//!
//! The engine itself accepts any number of [crate::event::CatalogEvent::SetQuery] calls; each one
//! fully supersedes the last. [QueryDebouncer] only exists so that a caller typing into a search
//! box does not pay for a full recompute on every keystroke. The clock is injected, so the
//! debouncer works the same under a browser timer, a native event loop, or a test.

use crate::config::CatalogConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDebouncer {
    window_ms: u64,
    /// Latest text of the current burst and the time it becomes releasable.
    pending: Option<(String, u64)>,
}

impl QueryDebouncer {
    pub fn new(window_ms: u64) -> Self {
        QueryDebouncer {
            window_ms,
            pending: None,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        QueryDebouncer::new(u64::from(config.debounce_ms))
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Record `text` as the latest edit. Any earlier pending text is dropped and the deadline
    /// restarts from `now_ms`.
    pub fn push<S: Into<String>>(&mut self, text: S, now_ms: u64) {
        let deadline = now_ms.saturating_add(self.window_ms);
        if let Some((previous, _)) = self.pending.replace((text.into(), deadline)) {
            tracing::trace!("debounce: superseded '{previous}'");
        }
    }

    /// Release the pending text if its deadline has been reached.
    pub fn poll(&mut self, now_ms: u64) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if now_ms >= *deadline => self.flush(),
            _ => None,
        }
    }

    /// Release the pending text regardless of the deadline.
    pub fn flush(&mut self) -> Option<String> {
        self.pending.take().map(|(text, _)| text)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending text becomes releasable.
    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }
}
