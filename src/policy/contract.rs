//! Host contract: the structural markers the kernel expects on the page.
//!
//! The host page defines these markers; the kernel never validates them
//! beyond treating an absent marker as an absent feature.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_CONTRACT_VERSION;

/// Structural markers of turns, content blocks and reasoning blocks.
///
/// ## Markers
///
/// - `turn_tag`: element tag of one rendered turn
/// - `user_container_class`: class of the container holding user input
/// - `authorship_attribute` / `user_authorship_value`: explicit authorship marker
/// - `reasoning_tag`: container of chain-of-thought content
/// - `final_answer_tag`: container of final-answer content
/// - `content_tag`: leaf block of authored text
/// - `affordance_captions`: expand/collapse captions rendered inside
///   reasoning blocks, removed literally from exported thoughts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostContract {
    /// Contract version identifier.
    pub version: String,
    /// Tag of a turn element.
    pub turn_tag: String,
    /// Class marking a user-content container.
    pub user_container_class: String,
    /// Attribute carrying explicit authorship.
    pub authorship_attribute: String,
    /// Authorship attribute value that means "user".
    pub user_authorship_value: String,
    /// Tag of a reasoning block.
    pub reasoning_tag: String,
    /// Tag of a final-answer container.
    pub final_answer_tag: String,
    /// Tag of a content block.
    pub content_tag: String,
    /// Captions stripped from reasoning text.
    pub affordance_captions: Vec<String>,
}

impl HostContract {
    /// Get the contract ID.
    pub fn contract_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the contract markers.
    ///
    /// Identical contracts hash identically across runs and platforms, so the
    /// hash can label which contract produced a set of annotations.
    pub fn contract_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

impl Default for HostContract {
    fn default() -> Self {
        Self {
            version: DEFAULT_CONTRACT_VERSION.to_string(),
            turn_tag: "ms-chat-turn".to_string(),
            user_container_class: "user-prompt-container".to_string(),
            authorship_attribute: "data-turn-role".to_string(),
            user_authorship_value: "User".to_string(),
            reasoning_tag: "ms-thought-chunk".to_string(),
            final_answer_tag: "ms-response-chunk".to_string(),
            content_tag: "ms-text-chunk".to_string(),
            affordance_captions: vec![
                "Expand to view model thoughts".to_string(),
                "Collapse to hide model thoughts".to_string(),
            ],
        }
    }
}
