//! Session glue: document, sync controller, UI signal and export actions.
//!
//! ```text
//! host mutations → Document records → flush() → SyncController → roles
//!                                                   ↓ (ensure_ui)
//!                                             UiCollaborator
//! export(format) → ConversationExtractor → ExportArtifact → ExportSink
//! ```

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::canonical::canonical_hash_hex;
use crate::config::KernelConfig;
use crate::document::{Document, NodeId};
use crate::export::{
    ExportArtifact, ExportConfig, ExportError, ExportFormat, ExportSink, SavedExport,
};
use crate::extract::{ConversationExtractor, ExtractError};
use crate::sync::{RoleLookup, SyncController, SyncReport};
use crate::types::{MessageRecord, Role};

/// Downstream UI that hosts the export actions.
pub trait UiCollaborator {
    /// Make sure the panel exists. Must be idempotent.
    fn ensure_present(&mut self);
}

/// UI collaborator that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUi;

impl UiCollaborator for NoopUi {
    fn ensure_present(&mut self) {}
}

/// A live transcript with its annotations.
pub struct TranscriptSession<U: UiCollaborator = NoopUi> {
    document: Document,
    controller: SyncController,
    extractor: ConversationExtractor,
    export: ExportConfig,
    ui: U,
}

impl<U: UiCollaborator> TranscriptSession<U> {
    /// Create a session over `document`.
    pub fn new(document: Document, config: KernelConfig, ui: U) -> Result<Self, ExtractError> {
        let KernelConfig { contract, sync, export } = config;
        info!(
            contract = %contract.contract_id(),
            contract_hash = %contract.contract_hash(),
            "transcript session created"
        );
        Ok(Self {
            document,
            extractor: ConversationExtractor::new(contract.clone())?,
            controller: SyncController::new(contract, sync),
            export,
            ui,
        })
    }

    /// Classify everything already on the page and show the UI.
    ///
    /// Records queued before the start are dropped; the rescan covers them.
    pub fn start(&mut self) -> SyncReport {
        self.document.take_records();
        let report = self.controller.rescan(&self.document);
        self.mirror(&report);
        self.ui.ensure_present();
        report
    }

    /// The document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The document, for host-side mutation.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The sync controller.
    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// The UI collaborator.
    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Stored role of a turn.
    pub fn role_of(&self, turn: NodeId) -> Option<Role> {
        self.controller.role_of(turn)
    }

    /// Process every queued mutation record as one batch.
    pub fn flush(&mut self) -> SyncReport {
        let batch = self.document.take_records();
        let report = self.controller.process(&self.document, &batch);
        self.mirror(&report);
        if report.ensure_ui {
            self.ui.ensure_present();
        }
        report
    }

    /// Flush until no records are queued or `max_rounds` passes ran.
    ///
    /// Returns the number of passes run. With role mirroring enabled, a
    /// change costs exactly one extra pass: the mirrored attribute writes
    /// are re-read and produce no further writes.
    pub fn settle(&mut self, max_rounds: usize) -> usize {
        let mut rounds = 0;
        while rounds < max_rounds && self.document.has_pending_records() {
            self.flush();
            rounds += 1;
        }
        if self.document.has_pending_records() {
            warn!(max_rounds, "mutation records still pending after settle");
        }
        rounds
    }

    fn mirror(&mut self, report: &SyncReport) {
        let Some(attribute) = self.controller.config().mirror_attribute.clone() else {
            return;
        };
        for change in &report.changes {
            let value = change.current.as_str();
            if let Err(err) = self.document.set_attribute(change.turn, &attribute, value) {
                warn!(turn = %change.turn, error = %err, "failed to mirror role");
            }
        }
    }

    /// Message records of the current document.
    pub fn extract(&self) -> Vec<MessageRecord> {
        self.extractor.extract(&self.document, &self.controller)
    }

    /// Render the current conversation.
    pub fn export(
        &self,
        format: ExportFormat,
        at: DateTime<Utc>,
    ) -> Result<ExportArtifact, ExportError> {
        let records = self.extract();
        let artifact = ExportArtifact::render(&records, format, &self.export, at)?;
        info!(
            format = %format,
            records = records.len(),
            fingerprint = %canonical_hash_hex(&records),
            filename = %artifact.filename,
            "export rendered"
        );
        Ok(artifact)
    }

    /// Render the current conversation now and hand it to `sink`.
    pub fn save(
        &self,
        sink: &impl ExportSink,
        format: ExportFormat,
    ) -> Result<SavedExport, ExportError> {
        let artifact = self.export(format, Utc::now())?;
        sink.save(&artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeSpec;
    use crate::export::MemorySink;
    use crate::sync::SyncConfig;

    #[derive(Default)]
    struct CountingUi {
        calls: usize,
    }

    impl UiCollaborator for CountingUi {
        fn ensure_present(&mut self) {
            self.calls += 1;
        }
    }

    fn thought_turn() -> NodeSpec {
        NodeSpec::element("ms-chat-turn").child(
            NodeSpec::element("ms-thought-chunk")
                .child(NodeSpec::element("ms-text-chunk").child(NodeSpec::text("hmm"))),
        )
    }

    fn mirrored() -> KernelConfig {
        KernelConfig {
            sync: SyncConfig {
                mirror_attribute: Some("data-role".to_string()),
                ..SyncConfig::default()
            },
            ..KernelConfig::default()
        }
    }

    #[test]
    fn test_mirror_settles_in_two_rounds() {
        let ui = CountingUi::default();
        let mut session = TranscriptSession::new(Document::new("body"), mirrored(), ui).unwrap();
        let root = session.document().root();
        let turn = session.document_mut().attach(root, &thought_turn()).unwrap();

        let rounds = session.settle(10);

        assert_eq!(rounds, 2);
        assert!(!session.document().has_pending_records());
        assert_eq!(session.document().attribute(turn, "data-role"), Some("thought"));
        assert_eq!(session.controller().stats().writes, 1);
        assert_eq!(session.ui().calls, 1);
    }

    #[test]
    fn test_without_mirror_document_untouched() {
        let mut session =
            TranscriptSession::new(Document::new("body"), KernelConfig::default(), NoopUi).unwrap();
        let root = session.document().root();
        let turn = session.document_mut().attach(root, &thought_turn()).unwrap();

        assert_eq!(session.settle(10), 1);
        assert_eq!(session.document().attribute(turn, "data-role"), None);
        assert_eq!(session.role_of(turn), Some(Role::Thought));
    }

    #[test]
    fn test_start_classifies_existing_page() {
        let doc = Document::from_spec(&NodeSpec::element("body").child(thought_turn())).unwrap();
        let mut session = TranscriptSession::new(doc, mirrored(), CountingUi::default()).unwrap();

        let report = session.start();
        assert_eq!(report.changes.len(), 1);
        assert_eq!(session.ui().calls, 1);

        // mirrored writes re-enter once and change nothing
        let report = session.flush();
        assert!(report.is_quiet());
        assert!(!session.document().has_pending_records());
    }

    #[test]
    fn test_save_hands_off_artifact() {
        let mut session =
            TranscriptSession::new(Document::new("body"), KernelConfig::default(), NoopUi).unwrap();
        let root = session.document().root();
        session.document_mut().attach(root, &thought_turn()).unwrap();
        session.flush();

        let sink = MemorySink::new();
        let saved = session.save(&sink, ExportFormat::Json).unwrap();

        let artifacts = sink.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].mime_type, "application/json");
        assert!(artifacts[0].filename.starts_with("gemini_data_"));
        assert_eq!(saved.digest, artifacts[0].digest());
        assert!(artifacts[0].content.contains("\"role\": \"thought\""));
    }
}
