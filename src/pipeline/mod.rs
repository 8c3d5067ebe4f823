//! Pipeline stages for Markdown-to-Word conversion.
//!
//! Each submodule implements exactly one transformation step, so every stage
//! can be tested without the external tools the others need.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ diagrams ──▶ svg ──▶ substitute ──▶ pandoc ──▶ docx
//! (read)    (line fixes)   (mmdc+size)  (png)   (links)        (tools)
//! ```
//!
//! 1. [`input`]      — validate the source, derive output and images paths
//! 2. [`preprocess`] — blank lines around lists and headings, checkboxes
//! 3. [`diagrams`]   — locate ```` ```mermaid ```` blocks and build image links
//! 4. [`sizing`]     — fit rendered PNGs to the printable page
//! 5. [`svg`]        — rasterise referenced SVG files
//! 6. [`tools`]      — run mermaid-cli, svgexport and pandoc; the only stage
//!    that spawns processes
//!
//! The DOCX restyling that follows pandoc lives in [`crate::docx`].

pub mod diagrams;
pub mod input;
pub mod preprocess;
pub mod sizing;
pub mod svg;
pub mod tools;
