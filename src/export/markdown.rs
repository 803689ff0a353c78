//! Human-readable transcript document.

use crate::types::MessageRecord;

/// Render records as a markdown transcript.
///
/// ```text
/// # {title}
///
/// ### USER
/// Hello
///
/// ---
///
/// ### MODEL
/// > **Thoughts:**
/// > Let me think
///
/// Hi there!
/// ```
pub fn to_markdown(records: &[MessageRecord], title: &str) -> String {
    let body = records
        .iter()
        .map(render_record)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!("# {title}\n\n{body}")
}

fn render_record(record: &MessageRecord) -> String {
    let mut out = format!("### {}\n", record.role_label().to_uppercase());
    if !record.thoughts.is_empty() {
        out.push_str("> **Thoughts:**\n> ");
        out.push_str(&record.thoughts.replace('\n', "\n> "));
        out.push_str("\n\n");
    }
    out.push_str(&record.content);
    out
}
