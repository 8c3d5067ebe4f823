//! Diagram sizing: fit rendered PNGs onto a printed page.
//!
//! The renderer produces PNGs at a fixed pixel density, so the natural size
//! of a diagram in inches is `pixels / DPI`. That size is scaled down (never
//! up) until both edges fit inside the fill area of the [`PageLayout`].
//!
//! Exactly one dimension is emitted in the image attribute. Pandoc derives
//! the other from the image's own aspect ratio, so giving both would risk
//! distortion from rounding.

use crate::config::PageLayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Target display size with exactly one constrained edge, in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "edge", content = "inches")]
pub enum ImageSize {
    Width(f64),
    Height(f64),
}

impl ImageSize {
    /// Pandoc link attribute, e.g. `{width=5.9in}`, one decimal place.
    pub fn attribute(&self) -> String {
        match self {
            ImageSize::Width(w) => format!("{{width={w:.1}in}}"),
            ImageSize::Height(h) => format!("{{height={h:.1}in}}"),
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSize::Width(w) => write!(f, "width {w:.1}in"),
            ImageSize::Height(h) => write!(f, "height {h:.1}in"),
        }
    }
}

/// How a diagram's size was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    /// Computed from the rendered image's pixel dimensions.
    Measured,
    /// Guessed from the diagram source.
    Heuristic,
    /// Rendering failed; the reference carries no size.
    Skipped,
}

// ── Dimension probing ───────────────────────────────────────────────────────

/// Width and height from a PNG header (signature + IHDR), or `None`.
pub fn png_dimensions(header: &[u8]) -> Option<(u32, u32)> {
    if header.len() < 24 || header[..8] != PNG_SIGNATURE {
        return None;
    }
    let width = u32::from_be_bytes(header[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(header[20..24].try_into().ok()?);
    Some((width, height))
}

/// Pixel dimensions of the image at `path`.
///
/// PNGs are measured from the first 24 bytes. Anything else is handed to the
/// `image` crate's header probe. Zero-sized or unreadable images → `None`.
pub fn read_image_dimensions(path: &Path) -> Option<(u32, u32)> {
    let mut header = [0u8; 24];
    let read = std::fs::File::open(path)
        .and_then(|mut f| {
            let mut filled = 0;
            while filled < header.len() {
                match f.read(&mut header[filled..])? {
                    0 => break,
                    n => filled += n,
                }
            }
            Ok(filled)
        })
        .ok()?;

    let dims = png_dimensions(&header[..read]).or_else(|| {
        debug!("{} is not a PNG, probing with image crate", path.display());
        image::image_dimensions(path).ok()
    })?;

    if dims.0 == 0 || dims.1 == 0 {
        None
    } else {
        Some(dims)
    }
}

// ── Sizing ──────────────────────────────────────────────────────────────────

/// Fit `width_px × height_px` into the layout's fill area.
///
/// Wide or square images are constrained by width, tall ones by height.
pub fn optimal_size(width_px: u32, height_px: u32, layout: &PageLayout) -> ImageSize {
    let width_in = f64::from(width_px) / layout.png_dpi;
    let height_in = f64::from(height_px) / layout.png_dpi;

    let width_scale = if width_in > 0.0 {
        layout.max_image_width_in() / width_in
    } else {
        1.0
    };
    let height_scale = if height_in > 0.0 {
        layout.max_image_height_in() / height_in
    } else {
        1.0
    };
    let scale = width_scale.min(height_scale).min(1.0);

    let aspect = if height_in > 0.0 { width_in / height_in } else { 1.0 };
    if aspect >= 1.0 {
        ImageSize::Width(width_in * scale)
    } else {
        ImageSize::Height(height_in * scale)
    }
}

/// Guess a size from the Mermaid source when the PNG cannot be measured.
pub fn heuristic_size(source: &str) -> ImageSize {
    let lower = source.to_lowercase();
    let subgraphs = lower.matches("subgraph").count();

    if lower.contains("gantt") || subgraphs >= 3 {
        return ImageSize::Width(5.8);
    }
    if lower.contains("flowchart lr") || lower.contains("graph lr") {
        return ImageSize::Width(5.8);
    }
    if lower.contains("flowchart tb") || lower.contains("graph tb") {
        return if subgraphs >= 2 {
            ImageSize::Height(8.0)
        } else {
            ImageSize::Width(5.0)
        };
    }
    ImageSize::Width(5.0)
}

/// Measure the PNG at `path`, falling back to [`heuristic_size`].
pub fn size_for_rendered(path: &Path, source: &str, layout: &PageLayout) -> (ImageSize, SizingMethod) {
    match read_image_dimensions(path) {
        Some((w, h)) => (optimal_size(w, h, layout), SizingMethod::Measured),
        None => (heuristic_size(source), SizingMethod::Heuristic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut h = PNG_SIGNATURE.to_vec();
        h.extend_from_slice(&13u32.to_be_bytes());
        h.extend_from_slice(b"IHDR");
        h.extend_from_slice(&width.to_be_bytes());
        h.extend_from_slice(&height.to_be_bytes());
        h
    }

    #[test]
    fn parses_png_header() {
        assert_eq!(png_dimensions(&png_header(480, 240)), Some((480, 240)));
    }

    #[test]
    fn rejects_short_or_foreign_headers() {
        assert_eq!(png_dimensions(&png_header(1, 1)[..23]), None);
        let mut gif = png_header(10, 10);
        gif[..6].copy_from_slice(b"GIF89a");
        assert_eq!(png_dimensions(&gif), None);
        assert_eq!(png_dimensions(&[]), None);
    }

    #[test]
    fn small_wide_image_keeps_natural_size() {
        // 480 px / 96 DPI = 5.0 in, under the 5.85 in limit.
        let size = optimal_size(480, 240, &PageLayout::LETTER);
        assert_eq!(size.attribute(), "{width=5.0in}");
    }

    #[test]
    fn large_wide_image_is_capped_at_fill_width() {
        let size = optimal_size(1920, 600, &PageLayout::LETTER);
        match size {
            ImageSize::Width(w) => assert!((w - 5.85).abs() < 1e-9, "got {w}"),
            other => panic!("expected width, got {other:?}"),
        }
    }

    #[test]
    fn tall_image_is_capped_at_fill_height() {
        let size = optimal_size(200, 1600, &PageLayout::LETTER);
        assert_eq!(size.attribute(), "{height=8.1in}");
    }

    #[test]
    fn tall_and_wide_constrained_by_tighter_edge() {
        // 1000×2000 px: width scale 0.5616, height scale 0.3888 → height wins.
        let size = optimal_size(1000, 2000, &PageLayout::LETTER);
        match size {
            ImageSize::Height(h) => assert!((h - 8.1).abs() < 1e-9, "got {h}"),
            other => panic!("expected height, got {other:?}"),
        }
    }

    #[test]
    fn square_image_uses_width() {
        assert!(matches!(
            optimal_size(300, 300, &PageLayout::LETTER),
            ImageSize::Width(_)
        ));
    }

    #[test]
    fn heuristics() {
        assert_eq!(heuristic_size("gantt\n title Plan"), ImageSize::Width(5.8));
        assert_eq!(
            heuristic_size("graph TD\nsubgraph a\nend\nsubgraph b\nend\nsubgraph c\nend"),
            ImageSize::Width(5.8)
        );
        assert_eq!(heuristic_size("flowchart LR\nA-->B"), ImageSize::Width(5.8));
        assert_eq!(
            heuristic_size("flowchart TB\nsubgraph a\nend\nsubgraph b\nend"),
            ImageSize::Height(8.0)
        );
        assert_eq!(heuristic_size("graph TB\nA-->B"), ImageSize::Width(5.0));
        assert_eq!(heuristic_size("sequenceDiagram\nA->>B: hi"), ImageSize::Width(5.0));
    }

    #[test]
    fn attribute_formats_one_decimal() {
        assert_eq!(ImageSize::Height(8.0).attribute(), "{height=8.0in}");
        assert_eq!(ImageSize::Width(5.8).attribute(), "{width=5.8in}");
    }

    #[test]
    fn reads_dimensions_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.png");
        let mut bytes = png_header(960, 480);
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(read_image_dimensions(&path), Some((960, 480)));
    }

    #[test]
    fn zero_dimensions_fall_back_to_heuristic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.png");
        std::fs::write(&path, png_header(0, 480)).unwrap();
        let (size, method) = size_for_rendered(&path, "gantt", &PageLayout::LETTER);
        assert_eq!(method, SizingMethod::Heuristic);
        assert_eq!(size, ImageSize::Width(5.8));
    }

    #[test]
    fn missing_file_falls_back_to_heuristic() {
        let (size, method) =
            size_for_rendered(Path::new("/no/such/diagram.png"), "graph TB", &PageLayout::LETTER);
        assert_eq!(method, SizingMethod::Heuristic);
        assert_eq!(size, ImageSize::Width(5.0));
    }

    #[test]
    fn jpeg_dimensions_via_image_crate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.jpg");
        image::RgbImage::new(64, 32).save(&path).unwrap();
        assert_eq!(read_image_dimensions(&path), Some((64, 32)));
    }
}
