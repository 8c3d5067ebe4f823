//! Post-processing of the `.docx` pandoc produces.
//!
//! ## Data Flow
//!
//! ```text
//! file.docx ──▶ package ──▶ xml ──▶ format ──▶ xml ──▶ package ──▶ file.docx
//!               (unzip)    (parse)  (rules)   (write)  (rezip, rename)
//! ```
//!
//! 1. [`package`] — open the zip container, read `word/document.xml` and
//!    `word/styles.xml`, write a new archive copying every other entry raw
//! 2. [`xml`]     — owned element tree with schema-ordered child insertion
//! 3. [`styles`]  — style id → display name, so rules can match `Heading 1`
//! 4. [`format`]  — the table, image, heading, code and spacing rules

pub mod format;
pub mod package;
pub mod styles;
pub mod xml;

pub use format::{apply_formatting, format_docx_file, FormattingReport};
pub use package::DocxPackage;
pub use styles::StyleMap;
