//! Input resolution: validate the source Markdown and derive the paths the
//! rest of the pipeline writes to.
//!
//! Everything is resolved relative to the source file's directory: generated
//! PNGs land in `<source dir>/<images_dir>`, the intermediate Markdown is
//! written next to the source, and pandoc is pointed at the source directory
//! via `--resource-path` so relative image links keep working.

use crate::error::Md2DocxError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A validated, readable source document.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// Path as given by the caller.
    pub path: PathBuf,
    /// Directory containing the source (`.` for a bare file name).
    pub dir: PathBuf,
    /// Full UTF-8 content.
    pub content: String,
}

/// Read `path`, mapping each failure to the matching error variant.
pub async fn resolve_source(path: &Path) -> Result<ResolvedSource, Md2DocxError> {
    // Directories must be rejected up front: reading one fails with a
    // platform-dependent error kind.
    match tokio::fs::metadata(path).await {
        Ok(meta) if !meta.is_file() => {
            return Err(Md2DocxError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) => return Err(read_error(path, e)),
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| read_error(path, e))?;

    let content = String::from_utf8(bytes).map_err(|_| Md2DocxError::InvalidEncoding {
        path: path.to_path_buf(),
    })?;

    let dir = source_dir(path);
    debug!(
        "Resolved source {} ({} bytes, dir {})",
        path.display(),
        content.len(),
        dir.display()
    );

    Ok(ResolvedSource {
        path: path.to_path_buf(),
        dir,
        content,
    })
}

fn read_error(path: &Path, e: std::io::Error) -> Md2DocxError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => Md2DocxError::SourceNotFound { path },
        ErrorKind::PermissionDenied => Md2DocxError::PermissionDenied { path },
        _ => Md2DocxError::SourceReadFailed { path, source: e },
    }
}

/// Directory that relative references in `source` are resolved against.
pub fn source_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `notes/report.md` → `notes/report.docx`.
pub fn default_output_path(source: &Path) -> PathBuf {
    source.with_extension("docx")
}

/// Create `<source dir>/<images_dir>` if needed and return its path.
pub async fn ensure_images_dir(source_dir: &Path, images_dir: &str) -> Result<PathBuf, Md2DocxError> {
    let dir = source_dir.join(images_dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| Md2DocxError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
    Ok(dir)
}
