// Transient user-visible notifications
//
// Recoverable failures (a rejected label write, a failed fetch) surface
// here as non-blocking notices instead of crashing anything. The buffer is
// a bounded ring shared between the engine (writer) and whatever front end
// displays it (reader).

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Maximum number of notices to keep in memory
const MAX_NOTICES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A single transient notice
#[derive(Debug, Clone)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub kind: NoticeKind,
    pub message: String,
}

/// Bounded ring of notices. Cloning shares the underlying buffer.
#[derive(Clone, Default)]
pub struct NoticeBuffer {
    entries: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= MAX_NOTICES {
                entries.pop_front();
            }
            entries.push_back(notice);
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeKind::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeKind::Info, message);
    }

    /// Snapshot of the current notices, oldest first
    pub fn snapshot(&self) -> Vec<Notice> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_snapshot() {
        let buffer = NoticeBuffer::new();
        buffer.error("label write rejected");
        buffer.info("model v2 ready");

        let notices = buffer.snapshot();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert_eq!(notices[1].message, "model v2 ready");
    }

    #[test]
    fn test_ring_drops_oldest() {
        let buffer = NoticeBuffer::new();
        for i in 0..(MAX_NOTICES + 5) {
            buffer.info(format!("notice {i}"));
        }
        let notices = buffer.snapshot();
        assert_eq!(notices.len(), MAX_NOTICES);
        assert_eq!(notices[0].message, "notice 5");
    }

    #[test]
    fn test_clone_shares_buffer() {
        let buffer = NoticeBuffer::new();
        let other = buffer.clone();
        other.error("shared");
        assert_eq!(buffer.len(), 1);
    }
}
