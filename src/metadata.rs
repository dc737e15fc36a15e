//! Title and author read from a loaded document

use crate::error::{ExportError, Result};
use serde::Deserialize;

/// Script evaluated in the page. The result is serialized so that it comes
/// back as a plain string value instead of a remote object handle.
pub const METADATA_SCRIPT: &str = r#"JSON.stringify({
    title: document.title,
    author: (document.querySelector('meta[name="author"]') || {}).content
})"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    /// Empty when the document has no author meta element.
    pub author: String,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    title: Option<String>,
    author: Option<String>,
}

impl DocumentMetadata {
    /// Builds metadata from the value [`METADATA_SCRIPT`] evaluated to.
    ///
    /// A blank title is treated as missing.
    pub fn from_script_value(value: &serde_json::Value, location: &str) -> Result<Self> {
        let json = value.as_str().ok_or_else(|| {
            ExportError::ExportFailed(format!("unexpected metadata value: {value}"))
        })?;
        let raw: RawMetadata = serde_json::from_str(json)
            .map_err(|err| ExportError::ExportFailed(format!("malformed metadata: {err}")))?;

        let title = raw
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .ok_or_else(|| ExportError::MetadataMissing {
                location: location.to_string(),
                field: "title",
            })?;

        let author = raw
            .author
            .map(|author| author.trim().to_string())
            .unwrap_or_default();

        Ok(DocumentMetadata { title, author })
    }
}
