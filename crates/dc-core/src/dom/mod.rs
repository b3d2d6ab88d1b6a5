//! Arena-based document model.
//!
//! The engine needs a live, mutable tree to reconcile against. Nodes
//! live in a slab owned by `Document`; a `NodeId` is an index into it.
//! Detached nodes keep their slot (ids stay valid) but are no longer
//! reachable from the root.
//!
//! Structural changes to *connected* nodes are appended to a mutation
//! journal with child-list granularity. The journal is the substrate
//! the change observer polls; it plays the role the platform
//! MutationObserver plays in a browser.

pub mod parse;

pub use parse::{parse_document, parse_fragment};

/// Handle to a node in a `Document` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Payload of a node.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// The document node itself. Exactly one per document, always the root.
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// One child-list change on a connected node.
#[derive(Debug, Clone, Copy)]
pub struct MutationRecord {
    /// The parent whose child list changed.
    pub target: NodeId,
}

/// Elements serialized without a closing tag and parsed without content.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// A mutable document tree with a mutation journal.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    journal: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document (just the root node).
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Root,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            journal: Vec::new(),
        }
    }

    /// Parse markup into a fresh document.
    pub fn parse(html: &str) -> Self {
        parse_document(html)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    // -------------------------------------------------------------------------
    // Node creation
    // -------------------------------------------------------------------------

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    // -------------------------------------------------------------------------
    // Tree structure
    // -------------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.root {
                return true;
            }
            match self.node(cur).parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Append `child` as the last child of `parent`, detaching it from
    /// any previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(!matches!(self.node(child).data, NodeData::Root));
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
        self.record_mutation(parent);
    }

    /// Remove a node from its parent. No-op for detached nodes and the root.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        // Journal against the pre-detach tree so connectivity is judged
        // before the node disappears from it.
        self.record_mutation(parent);
        self.node_mut(parent).children.retain(|&c| c != id);
        self.node_mut(id).parent = None;
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn pre_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            for &child in self.node(cur).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Deep-clone the subtree rooted at `id`. The clone is detached and
    /// never journaled.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = match &self.node(id).data {
            NodeData::Root => NodeData::Element {
                tag: "div".to_string(),
                attrs: Vec::new(),
            },
            other => other.clone(),
        };
        let clone = self.push_node(data);
        let children: Vec<NodeId> = self.node(id).children.clone();
        for child in children {
            let child_clone = self.clone_subtree(child);
            self.node_mut(clone).children.push(child_clone);
            self.node_mut(child_clone).parent = Some(clone);
        }
        clone
    }

    // -------------------------------------------------------------------------
    // Element accessors
    // -------------------------------------------------------------------------

    /// Tag name, lowercase. `None` for text and root nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Set (or replace) an attribute. Attribute changes are not journaled;
    /// the observer watches child-list changes only.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            let name = name.to_ascii_lowercase();
            if let Some(slot) = attrs.iter_mut().find(|(n, _)| *n == name) {
                slot.1 = value.to_string();
            } else {
                attrs.push((name, value.to_string()));
            }
        }
    }

    /// Drop every attribute whose name is not in `keep`.
    pub fn retain_attrs(&mut self, id: NodeId, keep: &[&str]) {
        if let NodeData::Element { attrs, .. } = &mut self.node_mut(id).data {
            attrs.retain(|(n, _)| keep.contains(&n.as_str()));
        }
    }

    /// First child that is an element, if any.
    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.pre_order(id) {
            if let NodeData::Text(text) = &self.node(node).data {
                out.push_str(text);
            }
        }
        out
    }

    // -------------------------------------------------------------------------
    // Mutation journal
    // -------------------------------------------------------------------------

    fn record_mutation(&mut self, target: NodeId) {
        if self.is_connected(target) {
            self.journal.push(MutationRecord { target });
        }
    }

    /// Drain all pending mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.journal)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.journal.is_empty()
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Serialized markup of the node's children.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.node(id).children.iter() {
            self.serialize_node(child, &mut out);
        }
        out
    }

    /// Serialized markup of the node itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(id, &mut out);
        out
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        match &self.node(id).data {
            NodeData::Root => {
                for &child in self.node(id).children.iter() {
                    self.serialize_node(child, out);
                }
            }
            NodeData::Text(text) => out.push_str(&escape_text(text)),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for &child in self.node(id).children.iter() {
                    self.serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_serialize() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "class", "box");
        let text = doc.create_text("hi & bye");
        doc.append_child(div, text);
        doc.append_child(doc.root(), div);

        assert_eq!(doc.outer_html(div), "<div class=\"box\">hi &amp; bye</div>");
        assert_eq!(doc.inner_html(doc.root()), "<div class=\"box\">hi &amp; bye</div>");
    }

    #[test]
    fn test_detach_removes_from_tree() {
        let mut doc = Document::new();
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        doc.append_child(doc.root(), a);
        doc.append_child(doc.root(), b);
        doc.detach(a);

        assert_eq!(doc.children(doc.root()), &[b]);
        assert!(doc.parent(a).is_none());
        assert!(!doc.is_connected(a));
        assert!(doc.is_connected(b));
    }

    #[test]
    fn test_journal_records_connected_changes_only() {
        let mut doc = Document::new();
        let attached = doc.create_element("div");
        doc.append_child(doc.root(), attached);
        doc.take_records();

        // Building a detached subtree produces no records.
        let orphan = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(orphan, child);
        assert!(!doc.has_pending_records());

        // Attaching it does.
        doc.append_child(attached, orphan);
        assert_eq!(doc.take_records().len(), 1);

        // Detaching a connected node does too.
        doc.detach(orphan);
        assert_eq!(doc.take_records().len(), 1);
    }

    #[test]
    fn test_clone_subtree_is_detached_deep_copy() {
        let mut doc = Document::parse("<div id=\"a\"><p>one</p><p>two</p></div>");
        let div = doc.children(doc.root())[0];
        doc.take_records();

        let clone = doc.clone_subtree(div);
        assert!(!doc.is_connected(clone));
        assert!(!doc.has_pending_records());
        assert_eq!(doc.outer_html(clone), doc.outer_html(div));

        // Mutating the clone leaves the original alone.
        let first = doc.children(clone)[0];
        doc.detach(first);
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.children(clone).len(), 1);
    }

    #[test]
    fn test_text_content() {
        let doc = Document::parse("<div>a<span>b</span><p>c</p></div>");
        let div = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(div), "abc");
    }

    #[test]
    fn test_retain_attrs() {
        let mut doc = Document::parse("<img src=\"a.png\" class=\"x\" data-y=\"1\">");
        let img = doc.children(doc.root())[0];
        doc.retain_attrs(img, &["src"]);
        assert_eq!(doc.outer_html(img), "<img src=\"a.png\">");
    }
}
