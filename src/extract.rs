//! Conversation extractor: turns plus annotations into message records.

use regex_lite::Regex;

use crate::document::{Document, NodeId};
use crate::policy::HostContract;
use crate::probe::FeatureProbe;
use crate::sync::RoleLookup;
use crate::types::MessageRecord;

/// Error building an extractor.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Caption pattern could not be compiled.
    #[error("Invalid affordance caption pattern: {0}")]
    CaptionPattern(#[from] regex_lite::Error),
}

/// Reads message records out of the current document.
///
/// Answer text and reasoning text are separated with the same rule the
/// probe uses: a content block inside a reasoning block is reasoning.
#[derive(Debug, Clone)]
pub struct ConversationExtractor {
    contract: HostContract,
    captions: Option<Regex>,
}

impl ConversationExtractor {
    /// Create an extractor for a contract.
    pub fn new(contract: HostContract) -> Result<Self, ExtractError> {
        let captions = caption_pattern(&contract.affordance_captions)?;
        Ok(Self { contract, captions })
    }

    /// Extract records for every turn in document order.
    ///
    /// Turns with neither content nor thoughts are skipped. Pure read.
    pub fn extract(&self, doc: &Document, roles: &impl RoleLookup) -> Vec<MessageRecord> {
        let probe = FeatureProbe::new(&self.contract);
        doc.descendants(doc.root())
            .filter(|n| probe.is_turn(doc, *n))
            .map(|turn| MessageRecord {
                role: roles.role_of(turn),
                content: self.content(doc, turn),
                thoughts: self.thoughts(doc, turn),
            })
            .filter(|record| !record.is_empty())
            .collect()
    }

    /// Final-answer text of a turn: trimmed content blocks outside reasoning,
    /// one per line.
    pub fn content(&self, doc: &Document, turn: NodeId) -> String {
        let probe = FeatureProbe::new(&self.contract);
        doc.descendants(turn)
            .filter(|n| probe.is_content(doc, *n) && !probe.in_reasoning(doc, turn, *n))
            .map(|n| doc.inner_text(n).trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reasoning text of a turn's first reasoning block, captions removed.
    pub fn thoughts(&self, doc: &Document, turn: NodeId) -> String {
        let probe = FeatureProbe::new(&self.contract);
        let Some(block) = doc.find_descendant(turn, |n| probe.is_reasoning(doc, n)) else {
            return String::new();
        };
        let text = doc.inner_text(block);
        match &self.captions {
            Some(pattern) => pattern.replace_all(&text, "").trim().to_string(),
            None => text.trim().to_string(),
        }
    }
}

/// Literal alternation of the configured captions.
fn caption_pattern(captions: &[String]) -> Result<Option<Regex>, regex_lite::Error> {
    let alternatives: Vec<String> = captions
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| regex_lite::escape(c))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&alternatives.join("|")).map(Some)
}
