//! Structured interchange document: `{"messages": [...]}`.

use serde::{Deserialize, Serialize};

use crate::types::MessageRecord;

#[derive(Serialize)]
struct ConversationRef<'a> {
    messages: &'a [MessageRecord],
}

#[derive(Deserialize)]
struct Conversation {
    messages: Vec<MessageRecord>,
}

/// Serialize records under a `messages` key, two-space indented.
pub fn to_json(records: &[MessageRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ConversationRef { messages: records })
}

/// Parse a document produced by [`to_json`].
pub fn from_json(json: &str) -> Result<Vec<MessageRecord>, serde_json::Error> {
    let conversation: Conversation = serde_json::from_str(json)?;
    Ok(conversation.messages)
}
