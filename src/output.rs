//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI can print it with `--json`.

use crate::docx::FormattingReport;
use crate::error::DiagramError;
use crate::pipeline::diagrams::DiagramKind;
use crate::pipeline::sizing::{ImageSize, SizingMethod};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Output of a full conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Where the `.docx` was written.
    pub output_path: PathBuf,
    /// One entry per Mermaid block, in document order.
    pub diagrams: Vec<DiagramResult>,
    /// One entry per distinct SVG link.
    pub svg_assets: Vec<SvgAssetResult>,
    /// Intermediate Markdown, when `keep_temp` was set.
    pub temp_markdown: Option<PathBuf>,
    pub stats: ConversionStats,
}

/// Result for a single Mermaid diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramResult {
    /// 1-based diagram number.
    pub number: usize,
    pub kind: DiagramKind,
    /// PNG the renderer wrote (or was asked to write).
    pub image_path: PathBuf,
    /// Markdown image link that replaced the block.
    pub reference: String,
    pub size: Option<ImageSize>,
    pub sizing: SizingMethod,
    /// Set when rendering failed; the link then carries no size.
    pub error: Option<DiagramError>,
    pub duration_ms: u64,
}

impl DiagramResult {
    pub fn is_rendered(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened to one SVG link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum SvgStatus {
    /// Rasterised during this run.
    Converted,
    /// A PNG with the same stem already existed.
    Reused,
    /// The converter failed; the link still points at the expected PNG.
    Failed(String),
    /// The SVG file does not exist; the link was left untouched.
    Missing,
}

impl fmt::Display for SvgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvgStatus::Converted => f.write_str("converted"),
            SvgStatus::Reused => f.write_str("reused"),
            SvgStatus::Failed(e) => write!(f, "failed: {e}"),
            SvgStatus::Missing => f.write_str("missing"),
        }
    }
}

/// Result for one distinct SVG link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvgAssetResult {
    /// The original `![alt](x.svg)` text.
    pub link: String,
    pub svg_path: PathBuf,
    pub png_path: PathBuf,
    /// Replacement link, `None` when the link was left as-is.
    pub reference: Option<String>,
    pub status: SvgStatus,
}

/// Counters and timings for a conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_diagrams: usize,
    pub rendered_diagrams: usize,
    pub failed_diagrams: usize,
    pub svg_converted: usize,
    pub svg_reused: usize,
    pub svg_failed: usize,
    pub svg_missing: usize,
    /// `None` when post-processing was disabled.
    pub formatting: Option<FormattingReport>,
    pub output_bytes: u64,
    pub diagrams_duration_ms: u64,
    pub pandoc_duration_ms: u64,
    pub format_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn count_svgs(&mut self, assets: &[SvgAssetResult]) {
        for a in assets {
            match a.status {
                SvgStatus::Converted => self.svg_converted += 1,
                SvgStatus::Reused => self.svg_reused += 1,
                SvgStatus::Failed(_) => self.svg_failed += 1,
                SvgStatus::Missing => self.svg_missing += 1,
            }
        }
    }
}

// ── Inspection ──────────────────────────────────────────────────────────────

/// What a conversion would do, computed without running any tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub bytes: usize,
    pub lines: usize,
    /// Lines the preprocessor would add.
    pub preprocess_added_lines: usize,
    pub diagrams: Vec<DiagramSummary>,
    pub svg_references: Vec<SvgReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub number: usize,
    pub kind: DiagramKind,
    pub lines: usize,
    /// Size used if the rendered PNG cannot be measured.
    pub fallback_size: ImageSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvgReference {
    pub alt: String,
    pub path: String,
    pub exists: bool,
}
