//! # md2docx
//!
//! Convert Markdown documents containing Mermaid diagrams and SVG images into
//! print-ready Word (`.docx`) files.
//!
//! ## Why this crate?
//!
//! pandoc turns Markdown into a perfectly valid Word document, but not one you
//! would hand to a reader: diagrams stay as code, SVGs are dropped or blurry,
//! images spill off the page, tables split across pages with no header
//! contrast, and headings end up orphaned at the bottom of a page. This crate
//! wraps pandoc with the steps before and after it that fix those problems.
//!
//! ## Pipeline Overview
//!
//! ```text
//! report.md
//!  │
//!  ├─ 1. Input       read UTF-8 source, create <dir>/images
//!  ├─ 2. Preprocess  blank lines around lists and headings, ☐ / ☑ checkboxes
//!  ├─ 3. Diagrams    ```mermaid blocks → mmdc → diagram-N.png, sized to the page
//!  ├─ 4. SVG         ![alt](x.svg) → svgexport → images/x.png
//!  ├─ 5. pandoc      intermediate markdown → .docx
//!  └─ 6. Format      tables, image centring, headings, code blocks, widow control
//! ```
//!
//! Steps 3 and 4 are best-effort: a diagram that fails to render is still
//! referenced and reported in [`ConversionOutput::diagrams`], and the document
//! converts anyway. Only a missing source or a failing pandoc is fatal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2docx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("docs/report.md", &config).await?;
//!     println!("wrote {}", output.output_path.display());
//!     eprintln!("diagrams: {}/{} rendered",
//!         output.stats.rendered_diagrams,
//!         output.stats.total_diagrams);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2docx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2docx = { version = "0.3", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Needed for | Without it |
//! |------|-----------|------------|
//! | `pandoc` | every conversion | fatal |
//! | `mmdc` (`@mermaid-js/mermaid-cli`) | Mermaid blocks | diagrams reported as failed |
//! | `svgexport` | SVG references | SVGs reported as failed |
//!
//! Each tool is looked up on `PATH`, in npm's global bin directories, and
//! finally through `npx`; see [`tool_locate`]. Any of them can be pinned
//! explicitly through [`ConversionConfigBuilder`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, FormattingOptions, PageLayout};
pub use convert::{convert, convert_sync, convert_to_file, inspect, restyle};
pub use docx::FormattingReport;
pub use error::{DiagramError, DocxError, Md2DocxError};
pub use output::{
    ConversionOutput, ConversionStats, DiagramResult, DiagramSummary, SourceSummary,
    SvgAssetResult, SvgReference, SvgStatus,
};
pub use pipeline::diagrams::DiagramKind;
pub use pipeline::sizing::{ImageSize, SizingMethod};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use tool_locate::{ExternalTool, ToolCommand};
