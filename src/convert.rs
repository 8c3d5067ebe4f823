//! Conversion entry points.
//!
//! [`convert`] and [`convert_to_file`] run the whole pipeline. [`inspect`]
//! reports what a conversion would do without running any external tool, and
//! [`restyle`] applies only the DOCX post-processing to an existing document.

use crate::config::ConversionConfig;
use crate::docx::{self, FormattingReport};
use crate::error::{DiagramError, Md2DocxError};
use crate::output::{
    ConversionOutput, ConversionStats, DiagramResult, DiagramSummary, SourceSummary, SvgReference,
};
use crate::pipeline::diagrams::{self, DiagramKind, MermaidBlock};
use crate::pipeline::sizing::{self, SizingMethod};
use crate::pipeline::{input, preprocess, svg, tools};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback, Stage};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tool_locate::{ExternalTool, ToolCommand};
use tracing::{debug, info, warn};

/// Convert a Markdown file to a `.docx` next to it (same stem).
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some diagrams or SVG images
/// failed (check `output.stats.failed_diagrams` and `output.svg_assets`).
///
/// # Errors
/// Returns `Err(Md2DocxError)` only for fatal errors:
/// - Source not found, unreadable, or not UTF-8
/// - pandoc missing, failing or timing out
/// - The generated document cannot be post-processed or written
pub async fn convert(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    let source = source.as_ref();
    let output = input::default_output_path(source);
    convert_to_file(source, output, config).await
}

/// Convert a Markdown file and write the document to `output_path`.
///
/// The document is assembled in a staging directory next to the output and
/// renamed into place, so `output_path` is never left half-written.
pub async fn convert_to_file(
    source: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    let total_start = Instant::now();
    let source = source.as_ref();
    let output_path = output_path.as_ref();
    let cb: &dyn ConversionProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&NoopProgressCallback);
    let timeout = Duration::from_secs(config.tool_timeout_secs);

    info!("Converting {} → {}", source.display(), output_path.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let src = input::resolve_source(source).await?;
    let pandoc = tools::resolve_command(ExternalTool::Pandoc, config.pandoc.as_ref())?;

    // ── Step 2: Preprocess ───────────────────────────────────────────────
    cb.on_stage(Stage::Preprocess);
    let content = preprocess::preprocess_markdown(&src.content);
    let images_path = input::ensure_images_dir(&src.dir, &config.images_dir).await?;

    // ── Step 3: Render diagrams ──────────────────────────────────────────
    let blocks = diagrams::find_mermaid_blocks(&content);
    info!("Found {} Mermaid diagrams", blocks.len());
    cb.on_conversion_start(blocks.len());

    let diagrams_start = Instant::now();
    let diagram_results = if blocks.is_empty() {
        Vec::new()
    } else {
        cb.on_stage(Stage::Diagrams);
        let mermaid = tools::resolve_command(ExternalTool::MermaidCli, config.mermaid.as_ref());
        if let Err(ref e) = mermaid {
            warn!("Diagrams will not be rendered: {}", e);
        }
        render_diagrams(&blocks, &mermaid, &images_path, config, cb).await
    };
    let diagrams_duration_ms = diagrams_start.elapsed().as_millis() as u64;

    // ── Step 4: Rasterise SVG references ─────────────────────────────────
    cb.on_stage(Stage::SvgAssets);
    let (content, svg_assets) =
        svg::convert_svg_assets(&content, &src.dir, &images_path, config, cb).await;

    // ── Step 5: Substitute diagram links ─────────────────────────────────
    let references: Vec<String> = diagram_results.iter().map(|d| d.reference.clone()).collect();
    let content = diagrams::replace_mermaid_blocks(&content, &references);

    // ── Step 6: pandoc ───────────────────────────────────────────────────
    let temp_md = write_temp_markdown(&src.dir, &content, config.keep_temp)?;
    let out_dir = input::source_dir(output_path);
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| Md2DocxError::OutputWriteFailed {
            path: out_dir.clone(),
            source: e,
        })?;
    let staging = tempfile::Builder::new()
        .prefix(".md2docx-")
        .tempdir_in(&out_dir)
        .map_err(|e| Md2DocxError::OutputWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    let staged = staging.path().join("document.docx");

    cb.on_stage(Stage::Pandoc);
    let pandoc_start = Instant::now();
    let resource_dir = tokio::fs::canonicalize(&src.dir)
        .await
        .unwrap_or_else(|_| src.dir.clone());
    tools::run_pandoc(
        &pandoc,
        temp_md.path(),
        &staged,
        &resource_dir,
        config.reference_doc.as_deref(),
        timeout,
    )
    .await?;
    let pandoc_duration_ms = pandoc_start.elapsed().as_millis() as u64;

    // ── Step 7: Post-process the document ────────────────────────────────
    let format_start = Instant::now();
    let formatting = if config.format {
        cb.on_stage(Stage::Formatting);
        Some(format_blocking(staged.clone(), output_path, config).await?)
    } else {
        None
    };
    let format_duration_ms = format_start.elapsed().as_millis() as u64;

    tokio::fs::rename(&staged, output_path)
        .await
        .map_err(|e| Md2DocxError::OutputWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;
    drop(staging);
    let temp_markdown = temp_md.finish();

    // ── Step 8: Stats ────────────────────────────────────────────────────
    let output_bytes = tokio::fs::metadata(output_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    let mut stats = ConversionStats {
        total_diagrams: diagram_results.len(),
        rendered_diagrams: diagram_results.iter().filter(|d| d.is_rendered()).count(),
        failed_diagrams: diagram_results.iter().filter(|d| !d.is_rendered()).count(),
        formatting,
        output_bytes,
        diagrams_duration_ms,
        pandoc_duration_ms,
        format_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..ConversionStats::default()
    };
    stats.count_svgs(&svg_assets);

    info!(
        "Conversion complete: {} ({} bytes, {}/{} diagrams, {}ms)",
        output_path.display(),
        output_bytes,
        stats.rendered_diagrams,
        stats.total_diagrams,
        stats.total_duration_ms
    );
    cb.on_conversion_complete(output_path, output_bytes);

    Ok(ConversionOutput {
        output_path: output_path.to_path_buf(),
        diagrams: diagram_results,
        svg_assets,
        temp_markdown,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    source: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, config))
}

/// Summarise a source document without running any external tool.
pub async fn inspect(source: impl AsRef<Path>) -> Result<SourceSummary, Md2DocxError> {
    let src = input::resolve_source(source.as_ref()).await?;
    let processed = preprocess::preprocess_markdown(&src.content);

    let diagrams = diagrams::find_mermaid_blocks(&processed)
        .into_iter()
        .map(|b| DiagramSummary {
            number: b.number(),
            kind: DiagramKind::detect(&b.body),
            lines: b.body.lines().count(),
            fallback_size: sizing::heuristic_size(&b.body),
        })
        .collect();

    let svg_references = svg::find_svg_references(&processed)
        .into_iter()
        .map(|r| SvgReference {
            exists: src.dir.join(&r.path).is_file(),
            alt: r.alt,
            path: r.path,
        })
        .collect();

    let lines = src.content.split('\n').count();
    Ok(SourceSummary {
        path: src.path,
        bytes: src.content.len(),
        lines,
        preprocess_added_lines: processed.split('\n').count().saturating_sub(lines),
        diagrams,
        svg_references,
    })
}

/// Apply the DOCX post-processing to an existing document, in place.
pub async fn restyle(
    docx_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<FormattingReport, Md2DocxError> {
    let path = docx_path.as_ref();
    if !path.is_file() {
        return Err(Md2DocxError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    format_blocking(path.to_path_buf(), path, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Render every block, `config.concurrency` at a time, results in document order.
async fn render_diagrams(
    blocks: &[MermaidBlock],
    mermaid: &Result<ToolCommand, Md2DocxError>,
    images_path: &Path,
    config: &ConversionConfig,
    cb: &dyn ConversionProgressCallback,
) -> Vec<DiagramResult> {
    let total = blocks.len();
    let mut results: Vec<DiagramResult> = stream::iter(
        blocks
            .iter()
            .map(|block| render_diagram(block, mermaid, images_path, config, cb, total)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    results.sort_by_key(|r| r.number);
    results
}

async fn render_diagram(
    block: &MermaidBlock,
    mermaid: &Result<ToolCommand, Md2DocxError>,
    images_path: &Path,
    config: &ConversionConfig,
    cb: &dyn ConversionProgressCallback,
    total: usize,
) -> DiagramResult {
    let number = block.number();
    let start = Instant::now();
    let image_path = images_path.join(diagrams::diagram_file_name(number));
    cb.on_diagram_start(number, total);

    let rendered = match mermaid {
        Ok(cmd) => tools::render_mermaid(
            cmd,
            &block.body,
            &image_path,
            &config.mermaid_background,
            Duration::from_secs(config.tool_timeout_secs),
        )
        .await
        .map_err(|e| DiagramError::from_tool_error(number, &e)),
        Err(e) => Err(DiagramError::from_tool_error(number, e)),
    };

    let (size, sizing, error) = match rendered {
        Ok(()) => {
            let (size, method) = sizing::size_for_rendered(&image_path, &block.body, &config.layout);
            debug!("Diagram {} sized {} ({:?})", number, size, method);
            cb.on_diagram_complete(number, total, Some(&size));
            (Some(size), method, None)
        }
        Err(e) => {
            warn!("{}", e);
            cb.on_diagram_error(number, total, &e.to_string());
            (None, SizingMethod::Skipped, Some(e))
        }
    };

    DiagramResult {
        number,
        kind: DiagramKind::detect(&block.body),
        reference: diagrams::diagram_reference(number, &config.images_dir, size.as_ref()),
        image_path,
        size,
        sizing,
        error,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// The intermediate Markdown handed to pandoc.
///
/// It lives in the source directory so relative links resolve the same way
/// they do for the source itself.
enum TempMarkdown {
    Scratch(tempfile::NamedTempFile),
    Kept(PathBuf),
}

impl TempMarkdown {
    fn path(&self) -> &Path {
        match self {
            TempMarkdown::Scratch(f) => f.path(),
            TempMarkdown::Kept(p) => p,
        }
    }

    /// Delete scratch files; report kept ones.
    fn finish(self) -> Option<PathBuf> {
        match self {
            TempMarkdown::Scratch(_) => None,
            TempMarkdown::Kept(p) => Some(p),
        }
    }
}

fn write_temp_markdown(dir: &Path, content: &str, keep: bool) -> Result<TempMarkdown, Md2DocxError> {
    let write_err = |e: std::io::Error| Md2DocxError::OutputWriteFailed {
        path: dir.join("_temp_word.md"),
        source: e,
    };

    let mut file = tempfile::Builder::new()
        .prefix("_temp_word")
        .suffix(".md")
        .tempfile_in(dir)
        .map_err(write_err)?;
    file.write_all(content.as_bytes()).map_err(write_err)?;
    file.flush().map_err(write_err)?;

    if keep {
        let (_, path) = file.keep().map_err(|e| write_err(e.error))?;
        info!("Keeping intermediate markdown: {}", path.display());
        Ok(TempMarkdown::Kept(path))
    } else {
        Ok(TempMarkdown::Scratch(file))
    }
}

/// Run the DOCX rules on a blocking thread; zip and XML work is CPU-bound.
async fn format_blocking(
    path: PathBuf,
    reported_path: &Path,
    config: &ConversionConfig,
) -> Result<FormattingReport, Md2DocxError> {
    let options = config.formatting_options();
    tokio::task::spawn_blocking(move || docx::format_docx_file(&path, &options))
        .await
        .map_err(|e| Md2DocxError::Internal(format!("formatting task failed: {e}")))?
        .map_err(|e| Md2DocxError::Docx {
            path: reported_path.to_path_buf(),
            source: e,
        })
}
