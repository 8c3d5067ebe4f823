//! DOCX package access: read the parts we restyle, write them back.
//!
//! Only `word/document.xml` is ever modified. Every other entry (media,
//! relationships, styles, numbering) is copied raw, without recompressing,
//! so the rewritten package is byte-identical apart from that one part.

use crate::docx::styles::StyleMap;
use crate::docx::xml::{self, Element};
use crate::error::DocxError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Package path of the main document part.
pub const DOCUMENT_PART: &str = "word/document.xml";
/// Package path of the style definitions part.
pub const STYLES_PART: &str = "word/styles.xml";

/// An opened `.docx` with its main document parsed.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    path: PathBuf,
    document: Element,
    styles: StyleMap,
}

fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<Option<String>, DocxError> {
    let mut file = match archive.by_name(part) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

impl DocxPackage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocxError> {
        let path = path.as_ref();
        let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

        let document_xml = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT_PART.to_string()))?;
        let document = xml::parse(DOCUMENT_PART, &document_xml)?;

        let styles = match read_part(&mut archive, STYLES_PART)? {
            Some(styles_xml) => StyleMap::from_styles(&xml::parse(STYLES_PART, &styles_xml)?),
            None => StyleMap::default(),
        };

        debug!(
            "Opened {} ({} entries, {} bytes of document XML)",
            path.display(),
            archive.len(),
            document_xml.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            document,
            styles,
        })
    }

    pub fn styles(&self) -> &StyleMap {
        &self.styles
    }

    pub fn document(&self) -> &Element {
        &self.document
    }

    /// The `w:body` element together with the style map, borrowed disjointly.
    pub fn body_and_styles_mut(&mut self) -> Result<(&mut Element, &StyleMap), DocxError> {
        let body = self
            .document
            .child_mut("w:body")
            .ok_or_else(|| DocxError::MissingPart(format!("{DOCUMENT_PART}#w:body")))?;
        Ok((body, &self.styles))
    }

    /// Write the package back over the file it was opened from.
    pub fn save(&self) -> Result<(), DocxError> {
        self.save_as(&self.path)
    }

    /// Write the package to `dest`, atomically.
    ///
    /// The archive is assembled in a temporary file next to `dest` and then
    /// renamed over it, so a failure never leaves a truncated document.
    pub fn save_as(&self, dest: impl AsRef<Path>) -> Result<(), DocxError> {
        let dest = dest.as_ref();
        let document_bytes = xml::to_bytes(DOCUMENT_PART, &self.document)?;

        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".md2docx-")
            .suffix(".docx")
            .tempfile_in(dir)?;

        {
            let mut source = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
            let mut writer = ZipWriter::new(BufWriter::new(tmp.as_file_mut()));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            for i in 0..source.len() {
                let entry = source.by_index_raw(i)?;
                if entry.name() == DOCUMENT_PART {
                    drop(entry);
                    writer.start_file(DOCUMENT_PART, options)?;
                    writer.write_all(&document_bytes)?;
                } else {
                    writer.raw_copy_file(entry)?;
                }
            }

            let mut inner = writer.finish()?;
            inner.flush()?;
        }

        tmp.persist(dest).map_err(|e| DocxError::Io(e.error))?;
        debug!("Wrote {}", dest.display());
        Ok(())
    }
}
