//! Role classification policy.

use crate::types::{Role, TurnFeatures};

/// Derive a role from probed features.
///
/// Priority, highest first:
///
/// 1. user-authored turns are `User`, whatever else they contain
/// 2. reasoning without any final answer is `Thought`
/// 3. everything else is `Model`
///
/// Total and pure: the same features always give the same role, and a turn
/// with no recognizable markers falls through to `Model`.
pub fn classify(features: TurnFeatures) -> Role {
    if features.is_user {
        Role::User
    } else if features.has_reasoning && !features.has_final_answer {
        Role::Thought
    } else {
        Role::Model
    }
}
