//! Structural change records.

use super::NodeId;

/// What changed on a mutation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were inserted into or removed from the target.
    ChildList {
        /// Inserted nodes, in insertion order.
        added: Vec<NodeId>,
        /// Removed nodes.
        removed: Vec<NodeId>,
    },
    /// An attribute of the target was set or removed.
    ///
    /// Recorded even when the new value equals the old one.
    Attributes {
        /// Attribute name.
        name: String,
    },
    /// The text of a text node changed.
    CharacterData,
}

/// One change notification.
///
/// Only mutations of nodes attached to the document are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Node the change was reported on.
    pub target: NodeId,
    /// Kind of change.
    pub kind: MutationKind,
}

impl Mutation {
    /// Nodes inserted by this mutation.
    pub fn added_nodes(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            _ => &[],
        }
    }

    /// Nodes removed by this mutation.
    pub fn removed_nodes(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { removed, .. } => removed,
            _ => &[],
        }
    }

    pub(crate) fn added(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList {
                added: vec![node],
                removed: Vec::new(),
            },
        }
    }

    pub(crate) fn removed(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![node],
            },
        }
    }
}
