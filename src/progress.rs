//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages and renders each diagram.
//!
//! # Example
//!
//! ```rust
//! use md2docx::{ConversionProgressCallback, ConversionConfig, ImageSize};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_diagram_complete(&self, n: usize, total: usize, size: Option<&ImageSize>) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Diagram {}/{} done ({:?})", n, total, size);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     rendered: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::SvgStatus;
use crate::pipeline::sizing::ImageSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Coarse pipeline stage, reported through [`ConversionProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preprocess,
    Diagrams,
    SvgAssets,
    Pandoc,
    Formatting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Preprocess => "Preprocessing markdown",
            Stage::Diagrams => "Rendering diagrams",
            Stage::SvgAssets => "Converting SVG images",
            Stage::Pandoc => "Running pandoc",
            Stage::Formatting => "Formatting document",
        })
    }
}

/// Called by the conversion pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, `on_diagram_start`, `on_diagram_complete` and
/// `on_diagram_error` may be called concurrently from different tasks.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when the pipeline enters a new stage.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once before any diagram is rendered.
    ///
    /// # Arguments
    /// * `total_diagrams` — number of Mermaid blocks found (may be zero)
    fn on_conversion_start(&self, total_diagrams: usize) {
        let _ = total_diagrams;
    }

    /// Called just before the renderer is started for a diagram.
    ///
    /// # Arguments
    /// * `n`     — 1-based diagram number
    /// * `total` — total diagrams in the document
    fn on_diagram_start(&self, n: usize, total: usize) {
        let _ = (n, total);
    }

    /// Called when a diagram has been rendered and sized.
    ///
    /// `size` is `None` only if the PNG could not be measured and no
    /// fallback applied.
    fn on_diagram_complete(&self, n: usize, total: usize, size: Option<&ImageSize>) {
        let _ = (n, total, size);
    }

    /// Called when a diagram failed to render. The conversion continues.
    fn on_diagram_error(&self, n: usize, total: usize, error: &str) {
        let _ = (n, total, error);
    }

    /// Called once per distinct SVG reference.
    fn on_svg_converted(&self, name: &str, status: &SvgStatus) {
        let _ = (name, status);
    }

    /// Called once after the document has been written.
    ///
    /// # Arguments
    /// * `output` — path of the final `.docx`
    /// * `bytes`  — its size on disk
    fn on_conversion_complete(&self, output: &Path, bytes: u64) {
        let _ = (output, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
