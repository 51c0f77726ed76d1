//! Structured error types for the Folio pagination pipeline.
//!
//! The pagination engine itself recovers locally from every content-shape
//! problem. What remains are the boundary failures: unparseable input,
//! bad configuration, a rendering surface that cannot be created, and a
//! conversion backend that refuses the document.

use thiserror::Error;

/// The unified error type returned by all public Folio API functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// The HTML input could not be turned into a document tree.
    #[error("failed to parse document: {message}")]
    Parse { message: String },

    /// A configuration document failed to parse.
    #[error("invalid configuration: {source}{hint}")]
    Config {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The layout host could not provide a rendering surface.
    #[error("rendering surface unavailable: {0}")]
    Surface(String),

    /// The HTML-to-PDF service answered with an error envelope.
    #[error("render backend failed{}: {message}", status_suffix(.status))]
    Backend { status: Option<u16>, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "\n  Hint: check for trailing commas, missing quotes, or unescaped characters."
            }
            serde_json::error::Category::Data => {
                "\n  Hint: the JSON is valid but a field has the wrong name or type."
            }
            serde_json::error::Category::Eof => "\n  Hint: unexpected end of input, is the file truncated?",
            serde_json::error::Category::Io => "",
        };
        FolioError::Config {
            source: e,
            hint: hint.to_string(),
        }
    }
}
