//! Change observer.
//!
//! Polls the document's mutation journal and hands out batches. A
//! non-empty batch means the tree changed structurally since the last
//! poll and the engine should reconcile. The observer performs no other
//! logic, so there is nothing in its path that can raise.

use crate::dom::{Document, MutationRecord};

/// One observer instance per loaded document.
#[derive(Debug, Default)]
pub struct ChangeObserver {
    started: bool,
    batches_seen: u64,
}

impl ChangeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin observing. Idempotent; there is no stop short of document
    /// teardown.
    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Number of non-empty batches handed out so far.
    pub fn batches_seen(&self) -> u64 {
        self.batches_seen
    }

    /// Drain pending records. `None` when not started or nothing changed.
    pub fn poll(&mut self, doc: &mut Document) -> Option<Vec<MutationRecord>> {
        if !self.started || !doc.has_pending_records() {
            return None;
        }
        self.batches_seen += 1;
        Some(doc.take_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_before_start_yields_nothing() {
        let mut doc = Document::parse("<div></div>");
        let mut observer = ChangeObserver::new();
        assert!(observer.poll(&mut doc).is_none());
    }

    #[test]
    fn test_batches_drain_the_journal() {
        let mut doc = Document::parse("<div></div>");
        let mut observer = ChangeObserver::new();
        observer.start();

        // Parse-time records form the first batch.
        assert!(observer.poll(&mut doc).is_some());
        assert!(observer.poll(&mut doc).is_none());

        let div = doc.children(doc.root())[0];
        let p = doc.create_element("p");
        doc.append_child(div, p);

        let batch = observer.poll(&mut doc).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].target, div);
        assert!(observer.poll(&mut doc).is_none());
        assert_eq!(observer.batches_seen(), 2);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut observer = ChangeObserver::new();
        observer.start();
        observer.start();
        assert!(observer.is_started());
    }
}
