//! Turn roles and probed turn features.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a rendered turn.
///
/// Derived from the turn's current content, never from its history: a turn
/// can move from `Thought` to `Model` (and back, if content disappears) on
/// any sync pass that touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Authored by the human participant.
    User,
    /// Model answer (possibly with reasoning attached).
    Model,
    /// Reasoning that has not produced a final answer yet.
    Thought,
}

impl Role {
    /// Parse role from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(Self::User),
            "model" => Some(Self::Model),
            "thought" => Some(Self::Thought),
            _ => None,
        }
    }

    /// Lowercase label, as written into annotations and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Thought => "thought",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural features of one turn, as seen by the probe.
///
/// Missing markers are simply `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TurnFeatures {
    /// Turn is authored by the human participant.
    pub is_user: bool,
    /// A reasoning block exists anywhere in the turn.
    pub has_reasoning: bool,
    /// Final-answer content exists outside every reasoning block.
    pub has_final_answer: bool,
}

impl TurnFeatures {
    /// Create a feature set.
    pub fn new(is_user: bool, has_reasoning: bool, has_final_answer: bool) -> Self {
        Self {
            is_user,
            has_reasoning,
            has_final_answer,
        }
    }
}
