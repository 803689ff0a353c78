//! Incremental sync controller.
//!
//! Keeps a side table `turn -> role` consistent with the live document by
//! re-classifying only the turns a batch of mutation records touched.
//!
//! ## Algorithm
//!
//! For each record in a batch:
//!
//! 1. every inserted element that is a turn is classified
//! 2. every turn below an inserted element is classified
//! 3. a record whose target is a turn classifies that turn; with
//!    `resolve_enclosing_turn`, a target anywhere inside a turn does too
//!
//! Then the last turn in document order is classified unconditionally, which
//! covers the streaming turn whose text grows below a node no rule above
//! catches. Turns that were removed and not re-inserted are pruned.
//!
//! ## Write-only-on-change
//!
//! The table is written only when the derived role differs from the stored
//! one. Each write is reported as a [`RoleChange`]; consumers that mirror
//! roles back into the document therefore only generate new mutations for
//! real changes, and the next pass over those mutations writes nothing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

use crate::document::{Document, Mutation, NodeId};
use crate::policy::{classify, HostContract};
use crate::probe::FeatureProbe;
use crate::types::Role;

/// Sync controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Re-classify the last turn in document order after every batch.
    pub reclassify_last_turn: bool,
    /// Treat a mutation anywhere inside a turn as touching that turn.
    pub resolve_enclosing_turn: bool,
    /// Attribute that role changes are mirrored onto, if any.
    pub mirror_attribute: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reclassify_last_turn: true,
            resolve_enclosing_turn: true,
            mirror_attribute: None,
        }
    }
}

/// Read access to turn annotations.
pub trait RoleLookup {
    /// Stored role of a turn, `None` if it was never classified.
    fn role_of(&self, turn: NodeId) -> Option<Role>;
}

impl RoleLookup for BTreeMap<NodeId, Role> {
    fn role_of(&self, turn: NodeId) -> Option<Role> {
        self.get(&turn).copied()
    }
}

/// One annotation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    /// Turn whose role changed.
    pub turn: NodeId,
    /// Role before the pass, `None` for a first classification.
    pub previous: Option<Role>,
    /// Role after the pass.
    pub current: Role,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of mutation records in the batch.
    pub records: usize,
    /// Distinct turns classified.
    pub evaluated: usize,
    /// Annotation writes, in evaluation order.
    pub changes: Vec<RoleChange>,
    /// Element nodes inserted by the batch.
    pub added_elements: usize,
    /// Turns dropped from the table because they left the document.
    pub pruned: Vec<NodeId>,
    /// Downstream UI should make sure its panel is present.
    pub ensure_ui: bool,
}

impl SyncReport {
    /// True when the pass wrote nothing.
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty() && self.pruned.is_empty()
    }
}

/// Cumulative counters over the controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Sync passes run (including rescans).
    pub passes: u64,
    /// Turn classifications.
    pub evaluations: u64,
    /// Annotation writes.
    pub writes: u64,
    /// Turns pruned.
    pub pruned: u64,
}

/// Owns turn annotations and updates them from mutation batches.
#[derive(Debug, Clone)]
pub struct SyncController {
    contract: HostContract,
    config: SyncConfig,
    roles: BTreeMap<NodeId, Role>,
    stats: SyncStats,
}

impl SyncController {
    /// Create a controller with an empty annotation table.
    pub fn new(contract: HostContract, config: SyncConfig) -> Self {
        Self {
            contract,
            config,
            roles: BTreeMap::new(),
            stats: SyncStats::default(),
        }
    }

    /// Host contract in use.
    pub fn contract(&self) -> &HostContract {
        &self.contract
    }

    /// Controller settings.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current annotations.
    pub fn roles(&self) -> &BTreeMap<NodeId, Role> {
        &self.roles
    }

    /// Lifetime counters.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Run one sync pass over a batch of mutation records.
    pub fn process(&mut self, doc: &Document, batch: &[Mutation]) -> SyncReport {
        let resolve_enclosing = self.config.resolve_enclosing_turn;
        let reclassify_last = self.config.reclassify_last_turn;

        let mut pass = Pass::new(FeatureProbe::new(&self.contract), doc, &mut self.roles);
        pass.report.records = batch.len();
        let mut removed: Vec<NodeId> = Vec::new();

        for mutation in batch {
            for &node in mutation.added_nodes() {
                if !doc.is_element(node) {
                    continue;
                }
                pass.report.added_elements += 1;
                if !doc.is_attached(node) {
                    continue;
                }
                if pass.probe.is_turn(doc, node) {
                    pass.evaluate(node);
                }
                let nested: Vec<NodeId> = doc
                    .descendants(node)
                    .filter(|n| pass.probe.is_turn(doc, *n))
                    .collect();
                for turn in nested {
                    pass.evaluate(turn);
                }
            }

            removed.extend_from_slice(mutation.removed_nodes());

            let target = mutation.target;
            if pass.probe.is_turn(doc, target) {
                pass.evaluate(target);
            } else if resolve_enclosing {
                if let Some(turn) = doc.closest(target, |n| pass.probe.is_turn(doc, n)) {
                    pass.evaluate(turn);
                }
            }
        }

        for node in removed {
            pass.prune_subtree(node);
        }

        if reclassify_last {
            if let Some(last) = doc.find_last(doc.root(), |n| pass.probe.is_turn(doc, n)) {
                pass.evaluate(last);
            }
        }

        let mut report = pass.finish();
        report.ensure_ui = report.added_elements > 0;
        self.record(&report);

        debug!(
            records = report.records,
            evaluated = report.evaluated,
            changes = report.changes.len(),
            pruned = report.pruned.len(),
            ensure_ui = report.ensure_ui,
            "sync pass"
        );
        report
    }

    /// Classify every attached turn and drop annotations of detached ones.
    ///
    /// Reconstructs the whole table from the document; used at startup and
    /// whenever the table may have drifted.
    pub fn rescan(&mut self, doc: &Document) -> SyncReport {
        let mut pass = Pass::new(FeatureProbe::new(&self.contract), doc, &mut self.roles);

        let turns: Vec<NodeId> = doc
            .descendants(doc.root())
            .filter(|n| pass.probe.is_turn(doc, *n))
            .collect();
        for turn in turns {
            pass.evaluate(turn);
        }

        let stale: Vec<NodeId> = pass
            .roles
            .keys()
            .copied()
            .filter(|t| !doc.is_attached(*t))
            .collect();
        for turn in stale {
            pass.prune(turn);
        }

        let report = pass.finish();
        self.record(&report);
        debug!(
            evaluated = report.evaluated,
            changes = report.changes.len(),
            pruned = report.pruned.len(),
            "rescan"
        );
        report
    }

    /// Forget all annotations.
    pub fn reset(&mut self) {
        self.roles.clear();
    }

    fn record(&mut self, report: &SyncReport) {
        self.stats.passes += 1;
        self.stats.evaluations += report.evaluated as u64;
        self.stats.writes += report.changes.len() as u64;
        self.stats.pruned += report.pruned.len() as u64;
    }
}

impl RoleLookup for SyncController {
    fn role_of(&self, turn: NodeId) -> Option<Role> {
        self.roles.role_of(turn)
    }
}

/// State of one pass: each turn is classified at most once.
struct Pass<'a> {
    probe: FeatureProbe<'a>,
    doc: &'a Document,
    roles: &'a mut BTreeMap<NodeId, Role>,
    seen: HashSet<NodeId>,
    report: SyncReport,
}

impl<'a> Pass<'a> {
    fn new(
        probe: FeatureProbe<'a>,
        doc: &'a Document,
        roles: &'a mut BTreeMap<NodeId, Role>,
    ) -> Self {
        Self {
            probe,
            doc,
            roles,
            seen: HashSet::new(),
            report: SyncReport::default(),
        }
    }

    fn evaluate(&mut self, turn: NodeId) {
        if !self.seen.insert(turn) || !self.doc.is_attached(turn) {
            return;
        }
        self.report.evaluated += 1;

        let current = classify(self.probe.probe(self.doc, turn));
        let previous = self.roles.get(&turn).copied();
        if previous == Some(current) {
            return;
        }

        self.roles.insert(turn, current);
        trace!(turn = %turn, ?previous, current = %current, "role changed");
        self.report.changes.push(RoleChange {
            turn,
            previous,
            current,
        });
    }

    /// Prune annotations of turns at or below a removed node.
    fn prune_subtree(&mut self, node: NodeId) {
        if self.doc.is_attached(node) {
            return;
        }
        let doc = self.doc;
        let turns: Vec<NodeId> = std::iter::once(node)
            .chain(doc.descendants(node))
            .filter(|n| self.roles.contains_key(n))
            .collect();
        for turn in turns {
            self.prune(turn);
        }
    }

    fn prune(&mut self, turn: NodeId) {
        if let Some(role) = self.roles.remove(&turn) {
            debug!(turn = %turn, role = %role, "pruned detached turn");
            self.report.pruned.push(turn);
        }
    }

    fn finish(self) -> SyncReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeSpec;

    fn text_chunk(text: &str) -> NodeSpec {
        NodeSpec::element("ms-text-chunk").child(NodeSpec::text(text))
    }

    fn user_turn(text: &str) -> NodeSpec {
        NodeSpec::element("ms-chat-turn")
            .child(NodeSpec::element("div").class("user-prompt-container").child(text_chunk(text)))
    }

    fn thought_turn(text: &str) -> NodeSpec {
        NodeSpec::element("ms-chat-turn")
            .child(NodeSpec::element("ms-thought-chunk").child(text_chunk(text)))
    }

    fn controller() -> SyncController {
        SyncController::new(HostContract::default(), SyncConfig::default())
    }

    fn flush(ctl: &mut SyncController, doc: &mut Document) -> SyncReport {
        let batch = doc.take_records();
        ctl.process(doc, &batch)
    }

    #[test]
    fn test_added_turns_classified() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let user = doc.attach(root, &user_turn("Hello")).unwrap();
        let thought = doc.attach(root, &thought_turn("Let me think")).unwrap();

        let mut ctl = controller();
        let report = flush(&mut ctl, &mut doc);

        assert_eq!(ctl.role_of(user), Some(Role::User));
        assert_eq!(ctl.role_of(thought), Some(Role::Thought));
        assert_eq!(report.changes.len(), 2);
        assert!(report.ensure_ui);
    }

    #[test]
    fn test_turns_inside_added_container() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let container = doc
            .attach(
                root,
                &NodeSpec::element("ms-chat-session").children([user_turn("a"), thought_turn("b")]),
            )
            .unwrap();

        let mut ctl = controller();
        let report = flush(&mut ctl, &mut doc);

        let turns = doc.children(container).to_vec();
        assert_eq!(ctl.role_of(turns[0]), Some(Role::User));
        assert_eq!(ctl.role_of(turns[1]), Some(Role::Thought));
        assert_eq!(report.evaluated, 2);
    }

    #[test]
    fn test_repeat_pass_writes_nothing() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let turn = doc.attach(root, &thought_turn("x")).unwrap();

        let mut ctl = controller();
        let batch = doc.take_records();
        let first = ctl.process(&doc, &batch);
        let second = ctl.process(&doc, &batch);
        let third = ctl.process(&doc, &batch);

        assert_eq!(first.changes.len(), 1);
        assert!(second.is_quiet());
        assert!(third.is_quiet());
        assert_eq!(ctl.stats().writes, 1);
        assert_eq!(ctl.role_of(turn), Some(Role::Thought));
    }

    #[test]
    fn test_thought_becomes_model_when_answer_appears() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let turn = doc.attach(root, &thought_turn("Let me think")).unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);
        assert_eq!(ctl.role_of(turn), Some(Role::Thought));

        doc.attach(turn, &text_chunk("Hi there!")).unwrap();
        let report = flush(&mut ctl, &mut doc);

        assert_eq!(
            report.changes,
            vec![RoleChange { turn, previous: Some(Role::Thought), current: Role::Model }]
        );
    }

    #[test]
    fn test_deep_insert_into_earlier_turn_needs_enclosing_resolution() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let first = doc
            .attach(
                root,
                &NodeSpec::element("ms-chat-turn")
                    .child(NodeSpec::element("div").child(NodeSpec::element("ms-thought-chunk"))),
            )
            .unwrap();
        doc.attach(root, &user_turn("later")).unwrap();

        let strict = SyncConfig {
            resolve_enclosing_turn: false,
            ..SyncConfig::default()
        };
        let mut strict_ctl = SyncController::new(HostContract::default(), strict);
        let mut ctl = controller();
        let batch = doc.take_records();
        strict_ctl.process(&doc, &batch);
        ctl.process(&doc, &batch);

        let wrapper = doc.children(first)[0];
        doc.attach(wrapper, &text_chunk("answer")).unwrap();
        let batch = doc.take_records();
        strict_ctl.process(&doc, &batch);
        ctl.process(&doc, &batch);

        assert_eq!(strict_ctl.role_of(first), Some(Role::Thought));
        assert_eq!(ctl.role_of(first), Some(Role::Model));
    }

    #[test]
    fn test_last_turn_catch_all_sees_streaming_text() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let turn = doc
            .attach(
                root,
                &NodeSpec::element("ms-chat-turn")
                    .child(NodeSpec::element("div").child(NodeSpec::element("ms-thought-chunk"))),
            )
            .unwrap();

        let catch_all_only = SyncConfig {
            resolve_enclosing_turn: false,
            ..SyncConfig::default()
        };
        let blind = SyncConfig {
            resolve_enclosing_turn: false,
            reclassify_last_turn: false,
            ..SyncConfig::default()
        };
        let mut ctl = SyncController::new(HostContract::default(), catch_all_only);
        let mut blind_ctl = SyncController::new(HostContract::default(), blind);
        let batch = doc.take_records();
        ctl.process(&doc, &batch);
        blind_ctl.process(&doc, &batch);

        // the answer lands below a wrapper, so no record targets the turn
        let wrapper = doc.children(turn)[0];
        doc.attach(wrapper, &text_chunk("done")).unwrap();
        let batch = doc.take_records();
        let report = ctl.process(&doc, &batch);
        blind_ctl.process(&doc, &batch);

        assert_eq!(ctl.role_of(turn), Some(Role::Model));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(blind_ctl.role_of(turn), Some(Role::Thought));
    }

    #[test]
    fn test_removed_turns_pruned() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let keep = doc.attach(root, &user_turn("a")).unwrap();
        let gone = doc.attach(root, &thought_turn("b")).unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);

        doc.remove_child(root, gone).unwrap();
        let report = flush(&mut ctl, &mut doc);

        assert_eq!(report.pruned, vec![gone]);
        assert_eq!(ctl.role_of(gone), None);
        assert_eq!(ctl.role_of(keep), Some(Role::User));
        assert!(!report.ensure_ui);
    }

    #[test]
    fn test_moved_turn_not_pruned() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let turn = doc.attach(root, &user_turn("a")).unwrap();
        doc.attach(root, &thought_turn("b")).unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);

        doc.append_child(root, turn).unwrap();
        let report = flush(&mut ctl, &mut doc);

        assert!(report.pruned.is_empty());
        assert_eq!(ctl.role_of(turn), Some(Role::User));
    }

    #[test]
    fn test_text_node_insertions_do_not_signal_ui() {
        let mut doc = Document::new("body");
        let root = doc.root();
        doc.attach(root, &thought_turn("x")).unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);

        doc.attach(root, &NodeSpec::text("\n")).unwrap();
        let report = flush(&mut ctl, &mut doc);
        assert_eq!(report.added_elements, 0);
        assert!(!report.ensure_ui);
    }

    #[test]
    fn test_malformed_turn_defaults_to_model() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let turn = doc
            .attach(root, &NodeSpec::element("ms-chat-turn").child(NodeSpec::text("stray")))
            .unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);
        assert_eq!(ctl.role_of(turn), Some(Role::Model));
    }

    #[test]
    fn test_reset_then_rescan_writes_every_turn_again() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let a = doc.attach(root, &user_turn("a")).unwrap();
        let b = doc.attach(root, &thought_turn("b")).unwrap();
        let mut ctl = controller();
        flush(&mut ctl, &mut doc);

        ctl.reset();
        assert!(ctl.roles().is_empty());
        assert_eq!(ctl.role_of(a), None);

        let report = ctl.rescan(&doc);
        assert_eq!(report.changes.len(), 2);
        assert!(report.changes.iter().all(|c| c.previous.is_none()));
        assert_eq!(ctl.role_of(a), Some(Role::User));
        assert_eq!(ctl.role_of(b), Some(Role::Thought));
        assert_eq!(ctl.stats().writes, 4);
    }

    #[test]
    fn test_rescan_rebuilds_table() {
        let mut doc = Document::new("body");
        let root = doc.root();
        let a = doc.attach(root, &user_turn("a")).unwrap();
        let b = doc.attach(root, &thought_turn("b")).unwrap();
        doc.take_records();

        let mut ctl = controller();
        let report = ctl.rescan(&doc);
        assert_eq!(report.evaluated, 2);
        assert_eq!(ctl.role_of(a), Some(Role::User));
        assert_eq!(ctl.role_of(b), Some(Role::Thought));

        doc.remove_child(root, b).unwrap();
        let report = ctl.rescan(&doc);
        assert_eq!(report.pruned, vec![b]);
        assert!(report.changes.is_empty());
    }
}
