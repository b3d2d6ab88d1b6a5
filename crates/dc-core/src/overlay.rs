//! Overlay controller.
//!
//! Renders the stored snapshot in a floating modal, independent of
//! live DOM state. Two states, explicit transitions only; the overlay
//! never auto-opens. The controller owns exactly the subtree it
//! mounts and touches nothing else in the page.

use log::debug;

use crate::dom::{parse_fragment, Document, NodeId};
use crate::selector::Selector;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Id on the mounted overlay container, for styling and teardown.
pub const OVERLAY_ROOT_ID: &str = "declutter-overlay";

const OVERLAY_STYLE: &str = "position:fixed;top:0;left:0;right:0;bottom:0;\
    z-index:2147483647;background:rgba(0,0,0,0.6);overflow:auto;padding:2rem";
const PANEL_STYLE: &str = "max-width:48rem;margin:0 auto;background:#fff;\
    color:#111;padding:1.5rem;border-radius:8px";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    Open(Snapshot),
}

/// The overlay state machine. Re-opening while open tears the previous
/// overlay down first, so overlays never stack.
#[derive(Debug)]
pub struct OverlayController {
    state: OverlayState,
    mount: Option<NodeId>,
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayController {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Closed,
            mount: None,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, OverlayState::Open(_))
    }

    /// Render the stored snapshot. No-op (logged) when the store is
    /// empty; surfacing that to the user is a UI concern, not ours.
    pub fn open(&mut self, doc: &mut Document, store: &SnapshotStore) {
        let Some(snapshot) = store.get().cloned() else {
            debug!("overlay open requested with no snapshot stored");
            return;
        };
        self.close(doc);

        let overlay = doc.create_element("div");
        doc.set_attr(overlay, "id", OVERLAY_ROOT_ID);
        doc.set_attr(overlay, "style", OVERLAY_STYLE);

        let panel = doc.create_element("div");
        doc.set_attr(panel, "style", PANEL_STYLE);

        let dismiss = doc.create_element("button");
        doc.set_attr(dismiss, "data-declutter-dismiss", "");
        let dismiss_label = doc.create_text("Close");
        doc.append_child(dismiss, dismiss_label);

        let content = doc.create_element("div");
        for node in parse_fragment(doc, &snapshot.sanitized_html) {
            doc.append_child(content, node);
        }

        doc.append_child(panel, dismiss);
        doc.append_child(panel, content);
        doc.append_child(overlay, panel);

        let host = mount_host(doc);
        doc.append_child(host, overlay);

        self.mount = Some(overlay);
        self.state = OverlayState::Open(snapshot);
    }

    /// Tear the overlay down and detach its whole subtree.
    pub fn close(&mut self, doc: &mut Document) {
        if let Some(mount) = self.mount.take() {
            doc.detach(mount);
        }
        self.state = OverlayState::Closed;
    }
}

/// The overlay mounts on `body` when the page has one, else the root.
fn mount_host(doc: &Document) -> NodeId {
    Selector::parse("body")
        .ok()
        .and_then(|sel| sel.query_first(doc, doc.root()))
        .unwrap_or_else(|| doc.root())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(html: &str) -> SnapshotStore {
        let mut store = SnapshotStore::new();
        store.store(Snapshot {
            source_selector: "#story".to_string(),
            sanitized_html: html.to_string(),
            captured_at: 1,
        });
        store
    }

    fn overlay_count(doc: &Document) -> usize {
        Selector::parse("#declutter-overlay")
            .unwrap()
            .query_all(doc, doc.root())
            .len()
    }

    #[test]
    fn test_open_with_empty_store_stays_closed() {
        let mut doc = Document::parse("<body></body>");
        let mut controller = OverlayController::new();
        controller.open(&mut doc, &SnapshotStore::new());

        assert_eq!(controller.state(), &OverlayState::Closed);
        assert_eq!(overlay_count(&doc), 0);
    }

    #[test]
    fn test_open_renders_snapshot_then_close_detaches_everything() {
        let mut doc = Document::parse("<body><main>page</main></body>");
        let mut controller = OverlayController::new();
        let store = stored("<h1>Title</h1><p>Body</p>");

        controller.open(&mut doc, &store);
        assert!(controller.is_open());
        assert_eq!(overlay_count(&doc), 1);
        let html = doc.inner_html(doc.root());
        assert!(html.contains("<h1>Title</h1><p>Body</p>"), "{html}");
        // Page content is untouched.
        assert!(html.contains("<main>page</main>"));

        controller.close(&mut doc);
        assert_eq!(controller.state(), &OverlayState::Closed);
        assert_eq!(overlay_count(&doc), 0);
        assert!(!doc.inner_html(doc.root()).contains("Title"));
    }

    #[test]
    fn test_reopen_does_not_stack() {
        let mut doc = Document::parse("<body></body>");
        let mut controller = OverlayController::new();
        let store = stored("<p>snap</p>");

        controller.open(&mut doc, &store);
        controller.open(&mut doc, &store);
        assert_eq!(overlay_count(&doc), 1);
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let mut doc = Document::parse("<body></body>");
        let mut controller = OverlayController::new();
        controller.close(&mut doc);
        assert_eq!(controller.state(), &OverlayState::Closed);
    }
}
