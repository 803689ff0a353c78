//! Exported message records.

use serde::{Deserialize, Serialize};

use super::turn::Role;

/// Label used for turns that were never classified.
pub const UNKNOWN_ROLE_LABEL: &str = "unknown";

/// Exported form of one turn.
///
/// Built fresh by the extractor on every export; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Classified role, `None` when the turn has no annotation yet.
    #[serde(with = "role_label")]
    pub role: Option<Role>,
    /// Final-answer text, one trimmed content block per line.
    pub content: String,
    /// Reasoning text with affordance captions removed.
    pub thoughts: String,
}

impl MessageRecord {
    /// Create a new record.
    pub fn new(
        role: Option<Role>,
        content: impl Into<String>,
        thoughts: impl Into<String>,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            thoughts: thoughts.into(),
        }
    }

    /// Role label as exported (`unknown` for unclassified turns).
    pub fn role_label(&self) -> &'static str {
        self.role.map(|r| r.as_str()).unwrap_or(UNKNOWN_ROLE_LABEL)
    }

    /// True when neither content nor thoughts carry text.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.thoughts.is_empty()
    }
}

/// Serializes `Option<Role>` as a plain label, `None` as `"unknown"`.
mod role_label {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::{Role, UNKNOWN_ROLE_LABEL};

    pub fn serialize<S: Serializer>(role: &Option<Role>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(role.map(|r| r.as_str()).unwrap_or(UNKNOWN_ROLE_LABEL))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Role>, D::Error> {
        let label = String::deserialize(deserializer)?;
        if label == UNKNOWN_ROLE_LABEL {
            return Ok(None);
        }
        Role::from_str(&label)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized role label: {label}")))
    }
}
