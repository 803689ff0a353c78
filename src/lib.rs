//! # transcript-kernel
//!
//! Role classification and structured export for rendered chat transcripts.
//!
//! The kernel answers two questions about a live chat page:
//!
//! > Which turns are user input, model answers, or still-unanswered reasoning?
//!
//! > What does the conversation look like as plain records?
//!
//! ## Core Contract
//!
//! 1. Probe each turn for three structural features (user-authored,
//!    reasoning present, final answer present)
//! 2. Derive its role with a fixed priority policy, as a pure function of
//!    current content
//! 3. Keep a side table of roles in sync with the page, touching only the
//!    turns a batch of mutations affected, writing only real changes
//! 4. On demand, extract `{role, content, thoughts}` records and render them
//!    as markdown or JSON
//!
//! ## Architecture
//!
//! ```text
//! Document mutations → SyncController → FeatureProbe → classify → roles
//!                                                                  ↓
//!                      ConversationExtractor (document + roles) → records
//!                                                                  ↓
//!                               to_markdown / to_json → ExportSink
//! ```
//!
//! ## Level-triggered roles
//!
//! Roles are never advanced by events. A turn that gains a final answer next
//! to its reasoning reads as `model` on the next pass that touches it, and
//! would read as `thought` again if the answer disappeared.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod document;
pub mod policy;
pub mod probe;
pub mod sync;
pub mod extract;
pub mod export;
pub mod session;
pub mod config;
pub mod canonical;
pub mod logging;

// Re-exports
pub use types::{Role, TurnFeatures, MessageRecord, UNKNOWN_ROLE_LABEL};
pub use document::{Document, DocumentError, Mutation, MutationKind, NodeId, NodeKind, NodeSpec};
pub use policy::{classify, HostContract};
pub use probe::FeatureProbe;
pub use sync::{RoleChange, RoleLookup, SyncConfig, SyncController, SyncReport, SyncStats};
pub use extract::{ConversationExtractor, ExtractError};
pub use export::{
    to_markdown, to_json, from_json,
    ExportArtifact, ExportConfig, ExportError, ExportFormat,
    ExportSink, DirectorySink, MemorySink, SavedExport,
};
pub use session::{TranscriptSession, UiCollaborator, NoopUi};
pub use config::{KernelConfig, ConfigError};
pub use canonical::{canonical_hash, canonical_hash_hex};
pub use logging::{init_tracing, LogFormat};

/// Default host contract version identifier.
pub const DEFAULT_CONTRACT_VERSION: &str = "host_contract_v1";
