//! SVG references: Word renders SVG poorly (or not at all in older
//! versions), so every `![alt](x.svg)` with an existing file is rasterised
//! once into the images directory and the link is pointed at the PNG.
//!
//! A PNG that already exists is reused as-is; delete it to force a refresh.

use crate::config::ConversionConfig;
use crate::output::{SvgAssetResult, SvgStatus};
use crate::pipeline::tools;
use crate::progress::ConversionProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tool_locate::{ExternalTool, ToolCommand};
use tracing::{debug, info, warn};

static RE_SVG_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+\.svg)\)").unwrap());

/// One `![alt](path.svg)` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgRef {
    /// The full matched link text.
    pub matched: String,
    pub alt: String,
    /// Path exactly as written, relative to the source directory.
    pub path: String,
}

impl SvgRef {
    /// `logo.png` for `assets/logo.svg`.
    pub fn png_name(&self) -> String {
        let stem = Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        format!("{stem}.png")
    }
}

/// Every SVG image link in `content`, in document order (duplicates kept).
pub fn find_svg_references(content: &str) -> Vec<SvgRef> {
    RE_SVG_REF
        .captures_iter(content)
        .map(|caps| SvgRef {
            matched: caps[0].to_string(),
            alt: caps[1].to_string(),
            path: caps[2].to_string(),
        })
        .collect()
}

/// `![alt](images/logo.png){width=5.8in}`.
pub fn png_reference(alt: &str, images_dir: &str, png_name: &str, width_in: f64) -> String {
    format!(
        "![{alt}]({}/{png_name}){{width={width_in:.1}in}}",
        images_dir.trim_end_matches(['/', '\\'])
    )
}

/// Rasterise every referenced SVG and rewrite the links.
///
/// Returns the rewritten content and one result per distinct link. A failed
/// conversion still rewrites the link so the document points at where the
/// PNG is expected; a missing SVG leaves the link untouched.
pub async fn convert_svg_assets(
    content: &str,
    source_dir: &Path,
    images_path: &Path,
    config: &ConversionConfig,
    callback: &dyn ConversionProgressCallback,
) -> (String, Vec<SvgAssetResult>) {
    let mut out = content.to_string();
    let mut results: Vec<SvgAssetResult> = Vec::new();
    let mut command: Option<Result<ToolCommand, String>> = None;
    let timeout = Duration::from_secs(config.tool_timeout_secs);

    for svg in find_svg_references(content) {
        if results.iter().any(|r| r.link == svg.matched) {
            continue;
        }

        let svg_path = source_dir.join(&svg.path);
        let png_name = svg.png_name();
        let png_path = images_path.join(&png_name);

        if !svg_path.is_file() {
            warn!("SVG not found, leaving reference as-is: {}", svg_path.display());
            callback.on_svg_converted(&svg.path, &SvgStatus::Missing);
            results.push(SvgAssetResult {
                link: svg.matched,
                svg_path,
                png_path,
                reference: None,
                status: SvgStatus::Missing,
            });
            continue;
        }

        let status = if png_path.exists() {
            debug!("Reusing {}", png_path.display());
            SvgStatus::Reused
        } else {
            let cmd = command.get_or_insert_with(|| {
                tools::resolve_command(ExternalTool::SvgExport, config.svgexport.as_ref())
                    .map_err(|e| e.to_string())
            });
            match cmd {
                Ok(cmd) => {
                    match tools::convert_svg(
                        cmd,
                        &svg_path,
                        &png_path,
                        config.svg_export_width_px,
                        timeout,
                    )
                    .await
                    {
                        Ok(()) => {
                            info!("Converted SVG {} → {}", svg.path, png_path.display());
                            SvgStatus::Converted
                        }
                        Err(e) => {
                            warn!("SVG conversion failed for {}: {}", svg.path, e);
                            SvgStatus::Failed(e.to_string())
                        }
                    }
                }
                Err(detail) => {
                    warn!("Cannot convert {}: {}", svg.path, detail);
                    SvgStatus::Failed(detail.clone())
                }
            }
        };

        let reference = png_reference(&svg.alt, &config.images_dir, &png_name, config.svg_width_in);
        out = out.replace(&svg.matched, &reference);
        callback.on_svg_converted(&svg.path, &status);
        results.push(SvgAssetResult {
            link: svg.matched,
            svg_path,
            png_path,
            reference: Some(reference),
            status,
        });
    }

    (out, results)
}
