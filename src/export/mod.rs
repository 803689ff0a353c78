//! Export serializer and save hand-off.
//!
//! Records are rendered into one of two documents, paired with a filename
//! and mime hint, and handed to an [`ExportSink`] that performs the save.
//!
//! | format | mime | default filename |
//! |---|---|---|
//! | markdown | `text/markdown` | `gemini_{unix_ms}.md` |
//! | json | `application/json` | `gemini_data_{unix_ms}.json` |

pub mod json;
pub mod markdown;
pub mod sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

use crate::types::MessageRecord;

pub use json::{from_json, to_json};
pub use markdown::to_markdown;
pub use sink::{DirectorySink, ExportSink, MemorySink, SavedExport};

/// Error for a single export action.
///
/// Annotations are never touched by a failed export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Records could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Sink could not write the artifact.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Export document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Markdown transcript.
    Markdown,
    /// JSON `{"messages": [...]}` document.
    Json,
}

impl ExportFormat {
    /// Parse format from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Mime type hint for the save collaborator.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown",
            Self::Json => "application/json",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Top-level markdown heading.
    pub title: String,
    /// Filename prefix of markdown exports.
    pub markdown_prefix: String,
    /// Filename prefix of JSON exports.
    pub json_prefix: String,
}

impl ExportConfig {
    /// Suggested filename; embeds the export time in Unix milliseconds.
    pub fn filename(&self, format: ExportFormat, at: DateTime<Utc>) -> String {
        let prefix = match format {
            ExportFormat::Markdown => &self.markdown_prefix,
            ExportFormat::Json => &self.json_prefix,
        };
        format!("{}_{}.{}", prefix, at.timestamp_millis(), format.extension())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            title: "Gemini Chat Export".to_string(),
            markdown_prefix: "gemini".to_string(),
            json_prefix: "gemini_data".to_string(),
        }
    }
}

/// A rendered export, ready for the save collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// Document format.
    pub format: ExportFormat,
    /// Rendered document.
    pub content: String,
    /// Suggested filename.
    pub filename: String,
    /// Mime type hint.
    pub mime_type: String,
}

impl ExportArtifact {
    /// Render records in `format`.
    pub fn render(
        records: &[MessageRecord],
        format: ExportFormat,
        config: &ExportConfig,
        at: DateTime<Utc>,
    ) -> Result<Self, ExportError> {
        let content = match format {
            ExportFormat::Markdown => to_markdown(records, &config.title),
            ExportFormat::Json => to_json(records)?,
        };
        Ok(Self {
            format,
            content,
            filename: config.filename(format, at),
            mime_type: format.mime_type().to_string(),
        })
    }

    /// SHA-256 of the content as lowercase hex.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.content.as_bytes()))
    }

    /// Content size in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// True for an empty document.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
