//! Arena model of the host document.
//!
//! The host page owns the tree and mutates it; the kernel only reads it.
//! Every mutation of an attached node is queued as a [`Mutation`] record
//! until drained with [`Document::take_records`], mirroring how a browser
//! delivers observer callbacks in batches.
//!
//! ## Identity
//!
//! Nodes live in an append-only arena. A [`NodeId`] stays valid for the
//! lifetime of the document, including after the node is removed from the
//! tree (it is then simply detached).

pub mod mutation;
pub mod spec;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use mutation::{Mutation, MutationKind};
pub use spec::{ElementSpec, NodeSpec};

/// Identity of a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index of the node.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a tag and attributes.
    Element {
        /// Tag name, compared case-insensitively.
        tag: String,
        /// Attributes by name.
        attributes: BTreeMap<String, String>,
    },
    /// Text node.
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Error for invalid tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// Id does not belong to this document.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    /// Operation requires an element.
    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),
    /// Operation requires a text node.
    #[error("Node {0} is not a text node")]
    NotAText(NodeId),
    /// Node is not a child of the given parent.
    #[error("Node {child} is not a child of {parent}")]
    NotAChild {
        /// Expected parent.
        parent: NodeId,
        /// Offending node.
        child: NodeId,
    },
    /// Insertion would make a node its own ancestor.
    #[error("Inserting {child} under {parent} would create a cycle")]
    Cycle {
        /// Insertion parent.
        parent: NodeId,
        /// Node being inserted.
        child: NodeId,
    },
    /// The document root cannot be moved.
    #[error("The document root cannot be moved")]
    RootMove,
    /// A document must be rooted at an element.
    #[error("Document root must be an element")]
    TextRoot,
}

/// Live document tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    records: Vec<Mutation>,
}

impl Document {
    /// Create an empty document rooted at an element with `root_tag`.
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            records: Vec::new(),
        };
        doc.root = doc.create_element(root_tag);
        doc
    }

    /// Load a document from a tree literal.
    ///
    /// Loading is not a mutation: no records are queued.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, DocumentError> {
        let el = match spec {
            NodeSpec::Element(el) => el,
            NodeSpec::Text(_) => return Err(DocumentError::TextRoot),
        };
        let mut doc = Self::new(&el.tag);
        let root = doc.root;
        for (name, value) in &el.attrs {
            doc.set_attribute(root, name, value)?;
        }
        for child in &el.children {
            doc.attach(root, child)?;
        }
        doc.records.clear();
        Ok(doc)
    }

    /// Root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the arena is empty (never the case after construction).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── construction ────────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    /// Build a detached subtree from a tree literal and return its root.
    pub fn build(&mut self, spec: &NodeSpec) -> NodeId {
        match spec {
            NodeSpec::Text(text) => self.create_text(text),
            NodeSpec::Element(el) => {
                let id = self.push(NodeKind::Element {
                    tag: el.tag.to_ascii_lowercase(),
                    attributes: el.attrs.clone(),
                });
                for child in &el.children {
                    let child_id = self.build(child);
                    self.nodes[child_id.0].parent = Some(id);
                    self.nodes[id.0].children.push(child_id);
                }
                id
            }
        }
    }

    /// Build a subtree and append it under `parent` as a single insertion.
    pub fn attach(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId, DocumentError> {
        self.element(parent)?;
        let id = self.build(spec);
        self.append_child(parent, id)?;
        Ok(id)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ── mutation ────────────────────────────────────────────────────────

    /// Append `child` as the last child of `parent`, moving it if needed.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference` (or last if `None`).
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DocumentError> {
        self.element(parent)?;
        self.node(child)?;
        if child == self.root {
            return Err(DocumentError::RootMove);
        }
        if self.contains(child, parent) {
            return Err(DocumentError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) || reference == child {
                return Err(DocumentError::NotAChild { parent, child: reference });
            }
        }

        if let Some(old_parent) = self.nodes[child.0].parent {
            self.detach(old_parent, child);
        }

        let siblings = &mut self.nodes[parent.0].children;
        let position = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[child.0].parent = Some(parent);

        if self.is_attached(parent) {
            self.records.push(Mutation::added(parent, child));
        }
        Ok(())
    }

    /// Remove `child` from `parent`. The child stays valid, detached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(DocumentError::NotAChild { parent, child });
        }
        self.detach(parent, child);
        Ok(())
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let attached = self.is_attached(parent);
        self.nodes[parent.0].children.retain(|c| *c != child);
        self.nodes[child.0].parent = None;
        if attached {
            self.records.push(Mutation::removed(parent, child));
        }
    }

    /// Set an attribute on an element.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        match &mut self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))?.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
            }
            NodeKind::Text(_) => return Err(DocumentError::NotAnElement(id)),
        }
        self.record_attribute(id, name);
        Ok(())
    }

    /// Remove an attribute from an element. Returns the old value.
    pub fn remove_attribute(
        &mut self,
        id: NodeId,
        name: &str,
    ) -> Result<Option<String>, DocumentError> {
        let old = match &mut self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))?.kind {
            NodeKind::Element { attributes, .. } => attributes.remove(name),
            NodeKind::Text(_) => return Err(DocumentError::NotAnElement(id)),
        };
        if old.is_some() {
            self.record_attribute(id, name);
        }
        Ok(old)
    }

    fn record_attribute(&mut self, id: NodeId, name: &str) {
        if self.is_attached(id) {
            self.records.push(Mutation {
                target: id,
                kind: MutationKind::Attributes { name: name.to_string() },
            });
        }
    }

    /// Replace the text of a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DocumentError> {
        self.edit_text(id, |current| {
            current.clear();
            current.push_str(text);
        })
    }

    /// Append to the text of a text node, as a streaming renderer does.
    pub fn append_text(&mut self, id: NodeId, text: &str) -> Result<(), DocumentError> {
        self.edit_text(id, |current| current.push_str(text))
    }

    fn edit_text(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut String),
    ) -> Result<(), DocumentError> {
        match &mut self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))?.kind {
            NodeKind::Text(current) => edit(current),
            NodeKind::Element { .. } => return Err(DocumentError::NotAText(id)),
        }
        if self.is_attached(id) {
            self.records.push(Mutation {
                target: id,
                kind: MutationKind::CharacterData,
            });
        }
        Ok(())
    }

    /// Drain queued mutation records.
    pub fn take_records(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.records)
    }

    /// True if mutation records are waiting to be drained.
    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    // ── queries ─────────────────────────────────────────────────────────

    fn node(&self, id: NodeId) -> Result<&NodeData, DocumentError> {
        self.nodes.get(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&NodeData, DocumentError> {
        let node = self.node(id)?;
        match node.kind {
            NodeKind::Element { .. } => Ok(node),
            NodeKind::Text(_) => Err(DocumentError::NotAnElement(id)),
        }
    }

    /// Payload of a node, `None` for foreign ids.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    /// True for element nodes.
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    /// Tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// True if `id` is an element with the given tag (case-insensitive).
    pub fn has_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id).is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Attribute value of an element.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// True if the element's `class` attribute lists `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Parent node, `None` for the root and for detached subtree roots.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Children in document order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// True if `id` is connected to the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// `id` followed by its ancestors, innermost first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.nodes.get(id.0).map(|_| id),
        }
    }

    /// Descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    /// First descendant (document order) matching `pred`.
    pub fn find_descendant(&self, id: NodeId, pred: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        self.descendants(id).find(|n| pred(*n))
    }

    /// Last descendant (document order) matching `pred`.
    ///
    /// Walks in reverse document order and stops at the first hit. Children
    /// are entered one at a time from the right, so the cost depends on how
    /// far from the end the match is, not on how many siblings precede it.
    pub fn find_last(&self, id: NodeId, pred: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        // (node, children not yet entered)
        let mut stack: Vec<(NodeId, usize)> = vec![(id, self.children(id).len())];
        while let Some((node, remaining)) = stack.last_mut() {
            let node = *node;
            if *remaining > 0 {
                *remaining -= 1;
                let child = self.children(node)[*remaining];
                stack.push((child, self.children(child).len()));
            } else {
                stack.pop();
                if node != id && pred(node) {
                    return Some(node);
                }
            }
        }
        None
    }

    /// Nearest inclusive ancestor matching `pred`.
    pub fn closest(&self, id: NodeId, pred: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        self.ancestors(id).find(|n| pred(*n))
    }

    /// Concatenation of all descendant text.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id).filter_map(|n| self.text(n)).collect()
    }

    /// Rendered text, treating every element as a block box.
    ///
    /// Adjacent text nodes join inline; each element child starts a new
    /// line; whitespace-only lines are dropped.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut lines = Vec::new();
        self.collect_lines(id, &mut lines);
        lines.join("\n")
    }

    fn collect_lines(&self, id: NodeId, lines: &mut Vec<String>) {
        if let Some(text) = self.text(id) {
            if !text.trim().is_empty() {
                lines.push(text.to_string());
            }
            return;
        }
        let mut inline = String::new();
        for child in self.children(id) {
            match self.text(*child) {
                Some(text) => inline.push_str(text),
                None => {
                    flush_line(&mut inline, lines);
                    self.collect_lines(*child, lines);
                }
            }
        }
        flush_line(&mut inline, lines);
    }
}

fn flush_line(inline: &mut String, lines: &mut Vec<String>) {
    if !inline.trim().is_empty() {
        lines.push(std::mem::take(inline));
    } else {
        inline.clear();
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over descendants.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack.extend(self.doc.children(current).iter().rev());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new("body");
        let root = doc.root();
        let list = doc
            .attach(
                root,
                &NodeSpec::element("div").children([
                    NodeSpec::element("p").child(NodeSpec::text("one")),
                    NodeSpec::element("p").child(NodeSpec::text("two")),
                ]),
            )
            .unwrap();
        doc.take_records();
        (doc, list)
    }

    #[test]
    fn test_descendants_document_order() {
        let (doc, list) = sample();
        let texts: Vec<_> = doc.descendants(list).filter_map(|n| doc.text(n)).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_find_last_is_reverse_document_order() {
        let (doc, _) = sample();
        let last_p = doc.find_last(doc.root(), |n| doc.has_tag(n, "p")).unwrap();
        assert_eq!(doc.text_content(last_p), "two");
        let last_any = doc.find_last(doc.root(), |_| true).unwrap();
        assert_eq!(doc.text(last_any), Some("two"));
        assert_eq!(doc.find_last(doc.root(), |n| n == doc.root()), None);
    }

    fn visits_to_last_turn(siblings: usize) -> usize {
        let mut doc = Document::new("body");
        let root = doc.root();
        let container = doc.attach(root, &NodeSpec::element("ms-chat-session")).unwrap();
        for i in 0..siblings {
            doc.attach(
                container,
                &NodeSpec::element("ms-chat-turn").child(NodeSpec::text(format!("turn {i}"))),
            )
            .unwrap();
        }
        let visits = std::cell::Cell::new(0);
        let last = doc.find_last(root, |n| {
            visits.set(visits.get() + 1);
            doc.has_tag(n, "ms-chat-turn")
        });
        assert_eq!(last, doc.children(container).last().copied());
        visits.get()
    }

    #[test]
    fn test_find_last_cost_independent_of_sibling_count() {
        let few = visits_to_last_turn(10);
        let many = visits_to_last_turn(10_000);
        assert_eq!(few, 2);
        assert_eq!(few, many);
    }

    #[test]
    fn test_attach_records_single_insertion() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let div = doc
            .attach(root, &NodeSpec::element("div").child(NodeSpec::element("span")))
            .unwrap();

        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, root);
        assert_eq!(records[0].added_nodes(), &[div]);
        assert!(!doc.has_pending_records());
    }

    #[test]
    fn test_detached_mutations_not_recorded() {
        let mut doc = Document::new("body");
        let div = doc.create_element("div");
        let text = doc.create_text("a");
        doc.append_child(div, text).unwrap();
        doc.set_attribute(div, "class", "x").unwrap();
        doc.append_text(text, "b").unwrap();
        assert!(doc.take_records().is_empty());
    }

    #[test]
    fn test_attribute_set_records_even_when_unchanged() {
        let mut doc = Document::new("body");
        let root = doc.root();
        doc.set_attribute(root, "data-role", "model").unwrap();
        doc.set_attribute(root, "data-role", "model").unwrap();
        assert_eq!(doc.take_records().len(), 2);
    }

    #[test]
    fn test_move_records_removal_and_insertion() {
        let (mut doc, list) = sample();
        let first = doc.children(list)[0];
        doc.append_child(list, first).unwrap();

        let records = doc.take_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].removed_nodes(), &[first]);
        assert_eq!(records[1].added_nodes(), &[first]);
        assert_eq!(doc.inner_text(list), "two\none");
    }

    #[test]
    fn test_insert_before_reference() {
        let (mut doc, list) = sample();
        let second = doc.children(list)[1];
        let text = doc.create_text("middle");
        let p = doc.create_element("p");
        doc.append_child(p, text).unwrap();
        doc.insert_before(list, p, Some(second)).unwrap();
        assert_eq!(doc.inner_text(list), "one\nmiddle\ntwo");
    }

    #[test]
    fn test_invalid_operations() {
        let (mut doc, list) = sample();
        let text = doc.descendants(list).find(|n| doc.text(*n).is_some()).unwrap();
        let root = doc.root();

        assert_eq!(doc.append_child(text, list), Err(DocumentError::NotAnElement(text)));
        assert_eq!(doc.set_text(list, "x"), Err(DocumentError::NotAText(list)));
        assert_eq!(doc.append_child(list, root), Err(DocumentError::RootMove));
        assert_eq!(
            doc.append_child(list, list),
            Err(DocumentError::Cycle { parent: list, child: list })
        );
        assert_eq!(
            doc.remove_child(list, root),
            Err(DocumentError::NotAChild { parent: list, child: root })
        );
        assert!(matches!(
            doc.set_attribute(NodeId(999), "a", "b"),
            Err(DocumentError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_remove_detaches() {
        let (mut doc, list) = sample();
        let first = doc.children(list)[0];
        doc.remove_child(list, first).unwrap();
        assert!(!doc.is_attached(first));
        assert_eq!(doc.parent(first), None);
        assert_eq!(doc.take_records()[0].removed_nodes(), &[first]);
    }

    #[test]
    fn test_inner_text_blocks_and_inline() {
        let doc = Document::from_spec(
            &NodeSpec::element("div").children([
                NodeSpec::text("Expand "),
                NodeSpec::text("me"),
                NodeSpec::element("p").child(NodeSpec::text("block")),
                NodeSpec::text("   "),
                NodeSpec::element("p"),
                NodeSpec::text("tail"),
            ]),
        )
        .unwrap();
        assert_eq!(doc.inner_text(doc.root()), "Expand me\nblock\ntail");
    }

    #[test]
    fn test_from_spec_queues_nothing() {
        let mut doc = Document::from_spec(
            &NodeSpec::element("body").attr("lang", "en").child(NodeSpec::element("main")),
        )
        .unwrap();
        assert_eq!(doc.attribute(doc.root(), "lang"), Some("en"));
        assert!(doc.take_records().is_empty());
        assert_eq!(Document::from_spec(&NodeSpec::text("x")).unwrap_err(), DocumentError::TextRoot);
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        let mut doc = Document::new("BODY");
        let root = doc.root();
        assert!(doc.has_tag(root, "body"));
        assert!(doc.has_tag(root, "Body"));
    }
}
