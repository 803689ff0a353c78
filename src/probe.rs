//! Feature probe: structural questions about one turn's current content.

use crate::document::{Document, NodeId};
use crate::policy::HostContract;
use crate::types::TurnFeatures;

/// Reads turn features from the document according to a host contract.
///
/// Read-only; safe to call any number of times between mutations.
#[derive(Debug, Clone, Copy)]
pub struct FeatureProbe<'a> {
    contract: &'a HostContract,
}

impl<'a> FeatureProbe<'a> {
    /// Create a probe for the given contract.
    pub fn new(contract: &'a HostContract) -> Self {
        Self { contract }
    }

    /// True if `node` is a turn element.
    pub fn is_turn(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_tag(node, &self.contract.turn_tag)
    }

    /// True if `node` is a reasoning block.
    pub fn is_reasoning(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_tag(node, &self.contract.reasoning_tag)
    }

    /// True if `node` is a content block.
    pub fn is_content(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_tag(node, &self.contract.content_tag)
    }

    /// True if `node` sits inside a reasoning block below `turn`.
    pub fn in_reasoning(&self, doc: &Document, turn: NodeId, node: NodeId) -> bool {
        doc.ancestors(node)
            .take_while(|a| *a != turn)
            .any(|a| self.is_reasoning(doc, a))
    }

    /// Probe a turn.
    ///
    /// A node that is not a turn has no features.
    pub fn probe(&self, doc: &Document, turn: NodeId) -> TurnFeatures {
        if !self.is_turn(doc, turn) {
            return TurnFeatures::default();
        }

        let c = self.contract;
        let authored_by_user = doc
            .attribute(turn, &c.authorship_attribute)
            .is_some_and(|v| v == c.user_authorship_value);
        let is_user = authored_by_user
            || doc
                .find_descendant(turn, |n| doc.has_class(n, &c.user_container_class))
                .is_some();

        let mut has_reasoning = false;
        let mut has_final_answer = false;
        for node in doc.descendants(turn) {
            if self.is_reasoning(doc, node) {
                has_reasoning = true;
            } else if doc.has_tag(node, &c.final_answer_tag) {
                has_final_answer = true;
            } else if !has_final_answer
                && self.is_content(doc, node)
                && !self.in_reasoning(doc, turn, node)
            {
                has_final_answer = true;
            }
            if has_reasoning && has_final_answer {
                break;
            }
        }

        TurnFeatures {
            is_user,
            has_reasoning,
            has_final_answer,
        }
    }
}
