//! Single-slot snapshot store.

/// A sanitized, static capture of one subtree at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Selector the capture was taken from.
    pub source_selector: String,
    /// Sanitized markup, safe to render in isolation.
    pub sanitized_html: String,
    /// Logical time of the capture.
    pub captured_at: u64,
}

/// Holds at most one snapshot. New captures overwrite the old one;
/// there is no history and no de-duplication (last write wins).
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, snapshot: Snapshot) {
        self.current = Some(snapshot);
    }

    pub fn get(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(selector: &str, at: u64) -> Snapshot {
        Snapshot {
            source_selector: selector.to_string(),
            sanitized_html: "<p>x</p>".to_string(),
            captured_at: at,
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = SnapshotStore::new();
        assert!(store.is_empty());

        store.store(snap("#a", 1));
        store.store(snap("#b", 2));

        let current = store.get().unwrap();
        assert_eq!(current.source_selector, "#b");
        assert_eq!(current.captured_at, 2);
    }
}
