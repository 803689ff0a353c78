//! Save collaborators.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ExportArtifact, ExportError};

/// Receipt of a completed save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedExport {
    /// Where the artifact went (a path, or the filename for in-memory sinks).
    pub location: String,
    /// Bytes written.
    pub bytes: usize,
    /// SHA-256 of the saved content.
    pub digest: String,
}

/// Takes `(content, filename, mime type)` and persists it somewhere.
///
/// The kernel only initiates the save; what happens to the resource after
/// that belongs to the sink.
pub trait ExportSink {
    /// Save one artifact.
    fn save(&self, artifact: &ExportArtifact) -> Result<SavedExport, ExportError>;
}

/// Writes artifacts as files into a directory, creating it when needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn save(&self, artifact: &ExportArtifact) -> Result<SavedExport, ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // filenames are suggestions; never let one escape the directory
        let name = Path::new(&artifact.filename)
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| format!("export.{}", artifact.format.extension()).into());
        let path = self.dir.join(name);

        fs::write(&path, artifact.content.as_bytes()).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        let saved = SavedExport {
            location: path.display().to_string(),
            bytes: artifact.len(),
            digest: artifact.digest(),
        };
        info!(
            location = %saved.location,
            bytes = saved.bytes,
            mime = %artifact.mime_type,
            "export saved"
        );
        Ok(saved)
    }
}

/// Keeps saved artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<ExportArtifact>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifacts saved so far, oldest first.
    pub fn artifacts(&self) -> Vec<ExportArtifact> {
        self.saved.lock().clone()
    }

    /// Number of saved artifacts.
    pub fn len(&self) -> usize {
        self.saved.lock().len()
    }

    /// True if nothing was saved.
    pub fn is_empty(&self) -> bool {
        self.saved.lock().is_empty()
    }
}

impl ExportSink for MemorySink {
    fn save(&self, artifact: &ExportArtifact) -> Result<SavedExport, ExportError> {
        let saved = SavedExport {
            location: artifact.filename.clone(),
            bytes: artifact.len(),
            digest: artifact.digest(),
        };
        self.saved.lock().push(artifact.clone());
        Ok(saved)
    }
}
