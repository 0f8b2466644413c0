//! Content Resolver: fetches the material behind an input and classifies it by
//! declared format.
//!
//! Never returns an error. Unreachable or unusable sources come back flagged so
//! the orchestrator can skip that input and keep going.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::blob::BlobStore;
use crate::domain::InputMaterial;
use crate::util::file_extension;

/// Format class derived from a MIME type or file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclaredFormat {
    PlainText,
    StructuredDocument,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Plain text, verbatim.
    Text(String),
    /// A document format whose text must be extracted before use. Reachable.
    RequiresExtraction { format: String },
    Unsupported { format: String },
    Unreachable { reason: String },
}

impl Resolution {
    /// Whether the synthesizer can work from this result.
    pub fn is_usable(&self) -> bool {
        matches!(self, Resolution::Text(_) | Resolution::RequiresExtraction { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Resolution::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Text(_) => "text",
            Resolution::RequiresExtraction { .. } => "requires_extraction",
            Resolution::Unsupported { .. } => "unsupported",
            Resolution::Unreachable { .. } => "unreachable",
        }
    }

    /// Human-readable reason for an unusable result.
    pub fn reason(&self) -> String {
        match self {
            Resolution::Text(_) => "text".into(),
            Resolution::RequiresExtraction { format } => format!("requires extraction ({})", format),
            Resolution::Unsupported { format } => format!("unsupported format ({})", format),
            Resolution::Unreachable { reason } => format!("unreachable ({})", reason),
        }
    }
}

pub fn classify_mime(content_type: &str) -> Option<DeclaredFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if mime.is_empty() || mime == "application/octet-stream" {
        return None;
    }
    let format = if mime.starts_with("text/") || mime == "application/json" {
        DeclaredFormat::PlainText
    } else if mime == "application/pdf"
        || mime == "application/msword"
        || mime == "application/rtf"
        || mime.starts_with("application/vnd.openxmlformats-officedocument.")
        || mime.starts_with("application/vnd.oasis.opendocument.")
        || mime.starts_with("application/vnd.ms-powerpoint")
    {
        DeclaredFormat::StructuredDocument
    } else {
        DeclaredFormat::Unsupported
    };
    Some(format)
}

pub fn classify_extension(name: &str) -> Option<DeclaredFormat> {
    let ext = file_extension(name)?;
    let format = match ext.as_str() {
        "txt" | "text" | "md" | "markdown" | "csv" | "json" => DeclaredFormat::PlainText,
        "pdf" | "doc" | "docx" | "ppt" | "pptx" | "odt" | "odp" | "rtf" => DeclaredFormat::StructuredDocument,
        _ => DeclaredFormat::Unsupported,
    };
    Some(format)
}

/// Declared content type first, then the file name, then the location.
pub fn classify_declared(input: &InputMaterial) -> Option<DeclaredFormat> {
    input
        .content_type
        .as_deref()
        .and_then(classify_mime)
        .or_else(|| classify_extension(&input.name))
        .or_else(|| classify_extension(&input.location))
}

pub struct ContentResolver {
    blobs: Arc<dyn BlobStore>,
    fetch_timeout: Duration,
}

impl ContentResolver {
    pub fn new(blobs: Arc<dyn BlobStore>, fetch_timeout: Duration) -> Self {
        Self { blobs, fetch_timeout }
    }

    #[instrument(level = "info", skip(self, input), fields(input_id = %input.id, name = %input.name))]
    pub async fn resolve(&self, input: &InputMaterial) -> Resolution {
        let declared = classify_declared(input);
        if declared == Some(DeclaredFormat::Unsupported) {
            let format = input
                .content_type
                .clone()
                .or_else(|| file_extension(&input.name))
                .unwrap_or_else(|| "unknown".into());
            debug!(target: "pipeline", %format, "Declared format unsupported; not fetching");
            return Resolution::Unsupported { format };
        }

        let fetched = match tokio::time::timeout(self.fetch_timeout, self.blobs.fetch(&input.location)).await {
            Ok(Ok(blob)) => blob,
            Ok(Err(e)) => {
                warn!(target: "pipeline", location = %input.location, error = %e, "Content fetch failed");
                return Resolution::Unreachable { reason: e.to_string() };
            }
            Err(_) => {
                warn!(target: "pipeline", location = %input.location, timeout = ?self.fetch_timeout, "Content fetch timed out");
                return Resolution::Unreachable {
                    reason: format!("fetch timed out after {:?}", self.fetch_timeout),
                };
            }
        };

        // Nothing declared: fall back to what the store reported.
        let format = declared.or_else(|| fetched.content_type.as_deref().and_then(classify_mime));
        match format {
            Some(DeclaredFormat::PlainText) => match String::from_utf8(fetched.bytes) {
                Ok(text) => {
                    let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
                    debug!(target: "pipeline", chars = text.chars().count(), "Resolved plain text");
                    Resolution::Text(text)
                }
                Err(_) => Resolution::Unsupported { format: "text (invalid utf-8)".into() },
            },
            Some(DeclaredFormat::StructuredDocument) => Resolution::RequiresExtraction {
                format: file_extension(&input.name)
                    .or_else(|| input.content_type.clone())
                    .or(fetched.content_type)
                    .unwrap_or_else(|| "document".into()),
            },
            Some(DeclaredFormat::Unsupported) | None => Resolution::Unsupported {
                format: fetched.content_type.unwrap_or_else(|| "unknown".into()),
            },
        }
    }
}
