//! Error types for the export pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`ExportError`]
pub type Result<T> = std::result::Result<T, ExportError>;

/// Terminal failure of a single export.
///
/// Every variant guarantees that nothing was written to the output location.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The source document could not be loaded or never went idle
    #[error("Failed to load {location}: {reason}")]
    SourceUnreachable { location: String, reason: String },

    /// A metadata field required for the header is absent
    #[error("Document {location} has no {field}")]
    MetadataMissing {
        location: String,
        field: &'static str,
    },

    /// The rendering engine failed to launch or to produce a PDF
    #[error("PDF export failed: {0}")]
    ExportFailed(String),

    /// The PDF was rendered but could not be written
    #[error("Failed to write {}: {}", .path.display(), .source)]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled the export
    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    pub(crate) fn unreachable(location: impl Into<String>, reason: impl Into<String>) -> Self {
        ExportError::SourceUnreachable {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::OutputWriteFailed {
            path: path.into(),
            source,
        }
    }
}
