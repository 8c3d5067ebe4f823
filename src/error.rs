//! Error types for the md2docx library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Md2DocxError`] — **Fatal**: the conversion cannot produce a document
//!   (unreadable source, pandoc missing or failing, corrupt DOCX output).
//!   Returned as `Err(Md2DocxError)` from the top-level `convert*` functions.
//!
//! * [`DiagramError`] — **Non-fatal**: one Mermaid diagram failed to render.
//!   Stored inside [`crate::output::DiagramResult`]; the diagram is still
//!   referenced (without a size hint) and the rest of the document converts.
//!
//! * [`DocxError`] — problems reading or writing the DOCX package itself.
//!   Wrapped into [`Md2DocxError::Docx`] with the offending path attached.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tool_locate::ExternalTool;

/// All fatal errors returned by the md2docx library.
#[derive(Debug, Error)]
pub enum Md2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source Markdown file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source exists but is not UTF-8 text.
    #[error("Source file is not valid UTF-8: '{path}'")]
    InvalidEncoding { path: PathBuf },

    /// Reading the source failed for a reason other than absence or permissions.
    #[error("Failed to read '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── External tool errors ──────────────────────────────────────────────
    /// A required external program could not be found or started.
    #[error("{tool} is not available: {detail}")]
    ToolNotFound { tool: ExternalTool, detail: String },

    /// An external program ran but exited unsuccessfully.
    #[error("{tool} failed (exit status {}): {stderr}", exit_status(.status))]
    ToolFailed {
        tool: ExternalTool,
        status: Option<i32>,
        stderr: String,
    },

    /// An external program did not finish within the configured timeout.
    #[error("{tool} timed out after {secs}s\nIncrease --tool-timeout.")]
    ToolTimeout { tool: ExternalTool, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The generated document could not be read, restyled, or rewritten.
    #[error("Failed to post-process '{path}': {source}")]
    Docx {
        path: PathBuf,
        #[source]
        source: DocxError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}

/// A non-fatal error for a single diagram.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiagramError {
    /// The diagram renderer is not installed.
    #[error("Diagram {index}: renderer unavailable: {detail}")]
    RendererUnavailable { index: usize, detail: String },

    /// The renderer exited with an error (usually a syntax error in the diagram).
    #[error("Diagram {index}: rendering failed: {detail}")]
    RenderFailed { index: usize, detail: String },

    /// The renderer did not finish in time.
    #[error("Diagram {index}: rendering timed out after {secs}s")]
    Timeout { index: usize, secs: u64 },
}

impl DiagramError {
    /// Classify a tool error raised while rendering diagram `index` (1-based).
    pub fn from_tool_error(index: usize, err: &Md2DocxError) -> Self {
        match err {
            Md2DocxError::ToolNotFound { detail, .. } => DiagramError::RendererUnavailable {
                index,
                detail: detail.clone(),
            },
            Md2DocxError::ToolTimeout { secs, .. } => DiagramError::Timeout { index, secs: *secs },
            other => DiagramError::RenderFailed {
                index,
                detail: other.to_string(),
            },
        }
    }
}

/// Errors reading or writing a DOCX package.
#[derive(Debug, Error)]
pub enum DocxError {
    /// The file is not a readable zip archive.
    #[error("invalid zip container: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A part the document needs is absent from the package.
    #[error("missing package part '{0}'")]
    MissingPart(String),

    /// A package part is not well-formed XML.
    #[error("malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
