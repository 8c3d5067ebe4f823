//! Configuration types for Markdown-to-Word conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! run can be logged and two runs compared field by field.

use crate::error::Md2DocxError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tool_locate::ToolCommand;

/// Configuration for a Markdown-to-Word conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .images_dir("assets")
///     .format_tables(false)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory for generated PNGs, relative to the source file's directory.
    /// Default: `"images"`.
    ///
    /// The same string prefixes the image references written into the
    /// intermediate Markdown, so pandoc resolves them against the source
    /// directory via `--resource-path`.
    pub images_dir: String,

    /// Printable page area used to size diagrams. Default: [`PageLayout::LETTER`].
    pub layout: PageLayout,

    /// Width given to rasterised SVG references, in inches. Default: 5.8.
    pub svg_width_in: f64,

    /// Pixel width requested from the SVG rasteriser. Default: 800.
    pub svg_export_width_px: u32,

    /// Background colour for rendered diagrams. Default: `"white"`.
    ///
    /// Mermaid renders on a transparent background by default, which prints
    /// as black on some Word themes.
    pub mermaid_background: String,

    /// Apply any post-processing to the generated document. Default: true.
    pub format: bool,

    /// Include the table rules (borders, shading, pagination) in
    /// post-processing. Default: true.
    pub format_tables: bool,

    /// Tables with at most this many rows are kept on one page. Default: 12.
    ///
    /// Larger tables only keep the header with the first data rows.
    pub table_keep_rows: usize,

    /// Keep the intermediate Markdown handed to pandoc. Default: false.
    pub keep_temp: bool,

    /// Diagrams rendered at the same time. Default: 1 (document order).
    ///
    /// Each mermaid-cli invocation starts a headless browser, so values above
    /// the number of CPU cores rarely help.
    pub concurrency: usize,

    /// Timeout for each external tool invocation in seconds. Default: 120.
    pub tool_timeout_secs: u64,

    /// Explicit pandoc command. `None` → discovered on `PATH`.
    pub pandoc: Option<ToolCommand>,

    /// Explicit mermaid-cli command. `None` → `mmdc` on `PATH`, else `npx mmdc`.
    pub mermaid: Option<ToolCommand>,

    /// Explicit svgexport command. `None` → `svgexport` on `PATH`, else `npx svgexport`.
    pub svgexport: Option<ToolCommand>,

    /// Optional pandoc reference document supplying base styles.
    pub reference_doc: Option<PathBuf>,

    /// Receives per-stage and per-diagram progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            images_dir: "images".to_string(),
            layout: PageLayout::LETTER,
            svg_width_in: 5.8,
            svg_export_width_px: 800,
            mermaid_background: "white".to_string(),
            format: true,
            format_tables: true,
            table_keep_rows: 12,
            keep_temp: false,
            concurrency: 1,
            tool_timeout_secs: 120,
            pandoc: None,
            mermaid: None,
            svgexport: None,
            reference_doc: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("images_dir", &self.images_dir)
            .field("layout", &self.layout)
            .field("svg_width_in", &self.svg_width_in)
            .field("svg_export_width_px", &self.svg_export_width_px)
            .field("mermaid_background", &self.mermaid_background)
            .field("format", &self.format)
            .field("format_tables", &self.format_tables)
            .field("table_keep_rows", &self.table_keep_rows)
            .field("keep_temp", &self.keep_temp)
            .field("concurrency", &self.concurrency)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("pandoc", &self.pandoc)
            .field("mermaid", &self.mermaid)
            .field("svgexport", &self.svgexport)
            .field("reference_doc", &self.reference_doc)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The DOCX post-processing options implied by this configuration.
    pub fn formatting_options(&self) -> FormattingOptions {
        FormattingOptions {
            format_tables: self.format_tables,
            table_keep_rows: self.table_keep_rows,
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn images_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn svg_width_in(mut self, inches: f64) -> Self {
        self.config.svg_width_in = inches;
        self
    }

    pub fn svg_export_width_px(mut self, px: u32) -> Self {
        self.config.svg_export_width_px = px.max(1);
        self
    }

    pub fn mermaid_background(mut self, colour: impl Into<String>) -> Self {
        self.config.mermaid_background = colour.into();
        self
    }

    pub fn format(mut self, v: bool) -> Self {
        self.config.format = v;
        self
    }

    pub fn format_tables(mut self, v: bool) -> Self {
        self.config.format_tables = v;
        self
    }

    pub fn table_keep_rows(mut self, rows: usize) -> Self {
        self.config.table_keep_rows = rows;
        self
    }

    pub fn keep_temp(mut self, v: bool) -> Self {
        self.config.keep_temp = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn pandoc(mut self, cmd: ToolCommand) -> Self {
        self.config.pandoc = Some(cmd);
        self
    }

    pub fn mermaid(mut self, cmd: ToolCommand) -> Self {
        self.config.mermaid = Some(cmd);
        self
    }

    pub fn svgexport(mut self, cmd: ToolCommand) -> Self {
        self.config.svgexport = Some(cmd);
        self
    }

    pub fn reference_doc(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.reference_doc = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2DocxError> {
        let c = &self.config;
        if c.images_dir.trim().is_empty() {
            return Err(Md2DocxError::InvalidConfig(
                "images directory must not be empty".into(),
            ));
        }
        c.layout.validate()?;
        if !(c.svg_width_in > 0.0) {
            return Err(Md2DocxError::InvalidConfig(format!(
                "SVG width must be positive, got {}",
                c.svg_width_in
            )));
        }
        if c.concurrency == 0 {
            return Err(Md2DocxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.tool_timeout_secs == 0 {
            return Err(Md2DocxError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page layout ──────────────────────────────────────────────────────────

/// Printable page area and raster density used to size diagrams.
///
/// Diagrams are scaled so neither edge exceeds `fill_ratio` of the usable
/// width/height, leaving room for a caption on the same page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Usable width in inches (page width minus side margins).
    pub usable_width_in: f64,
    /// Usable height in inches (page height minus top/bottom margins).
    pub usable_height_in: f64,
    /// Largest fraction of the usable area an image may occupy.
    pub fill_ratio: f64,
    /// Pixel density assumed for renderer output.
    pub png_dpi: f64,
}

impl PageLayout {
    /// US Letter (8.5" × 11") with 1" margins, 90 % fill, 96 DPI renderer output.
    pub const LETTER: PageLayout = PageLayout {
        usable_width_in: 6.5,
        usable_height_in: 9.0,
        fill_ratio: 0.90,
        png_dpi: 96.0,
    };

    /// A4 (210 × 297 mm) with 25.4 mm margins.
    pub const A4: PageLayout = PageLayout {
        usable_width_in: 6.27,
        usable_height_in: 9.69,
        fill_ratio: 0.90,
        png_dpi: 96.0,
    };

    /// Widest an image may be, in inches.
    pub fn max_image_width_in(&self) -> f64 {
        self.usable_width_in * self.fill_ratio
    }

    /// Tallest an image may be, in inches.
    pub fn max_image_height_in(&self) -> f64 {
        self.usable_height_in * self.fill_ratio
    }

    fn validate(&self) -> Result<(), Md2DocxError> {
        if !(self.usable_width_in > 0.0 && self.usable_height_in > 0.0) {
            return Err(Md2DocxError::InvalidConfig(format!(
                "page area must be positive, got {}×{} in",
                self.usable_width_in, self.usable_height_in
            )));
        }
        if !(self.fill_ratio > 0.0 && self.fill_ratio <= 1.0) {
            return Err(Md2DocxError::InvalidConfig(format!(
                "fill ratio must be in (0, 1], got {}",
                self.fill_ratio
            )));
        }
        if !(self.png_dpi > 0.0) {
            return Err(Md2DocxError::InvalidConfig(format!(
                "PNG DPI must be positive, got {}",
                self.png_dpi
            )));
        }
        Ok(())
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Which DOCX post-processing rules to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingOptions {
    /// Table borders, shading and pagination.
    pub format_tables: bool,
    /// Tables up to this many rows are kept together entirely.
    pub table_keep_rows: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            format_tables: true,
            table_keep_rows: 12,
        }
    }
}
