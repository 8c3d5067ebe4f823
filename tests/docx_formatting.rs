//! Integration tests for the DOCX post-processing.
//!
//! These build a small document shaped like pandoc's output with the `zip`
//! crate, so they need no external tools and always run.

use md2docx::docx::xml::Element;
use md2docx::docx::{format_docx_file, DocxPackage};
use md2docx::{restyle, ConversionConfig, FormattingOptions};
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

// ── Fixture ──────────────────────────────────────────────────────────────────

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/></w:style>
<w:style w:type="paragraph" w:styleId="Compact"><w:name w:val="Compact"/></w:style>
<w:style w:type="paragraph" w:styleId="SourceCode"><w:name w:val="Source Code"/></w:style>
<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/></w:style>
</w:styles>"#;

const MEDIA: &[u8] = &[0x89, b'P', b'N', b'G', 0, 1, 2, 3];

fn table(rows: usize) -> String {
    let mut xml = String::from("<w:tbl><w:tblPr><w:tblStyle w:val=\"Table\"/></w:tblPr>");
    for i in 0..rows {
        xml.push_str(&format!(
            "<w:tr><w:tc><w:p><w:pPr><w:pStyle w:val=\"Compact\"/></w:pPr><w:r><w:t>r{i}c0</w:t></w:r></w:p></w:tc>\
             <w:tc><w:p><w:pPr><w:pStyle w:val=\"Compact\"/></w:pPr><w:r><w:t>r{i}c1</w:t></w:r></w:p></w:tc></w:tr>"
        ));
    }
    xml.push_str("</w:tbl>");
    xml
}

fn document(table_rows: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Overview</w:t></w:r></w:p>
<w:p><w:r><w:t>Plain body text.</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="ListParagraph"/></w:pPr><w:r><w:t>☐ Item</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="SourceCode"/></w:pPr><w:r><w:rPr><w:rFonts w:asciiTheme="minorHAnsi"/></w:rPr><w:t xml:space="preserve">fn main() {{}}</w:t></w:r></w:p>
<w:p><w:r><w:drawing><wp:inline><wp:extent cx="100" cy="100"/></wp:inline></w:drawing></w:r></w:p>
<w:p/>
{table}
<w:sectPr/>
</w:body></w:document>"#,
        table = table(table_rows)
    )
}

fn write_docx(path: &Path, table_rows: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document(table_rows).as_bytes()).unwrap();
    zip.start_file("word/styles.xml", options).unwrap();
    zip.write_all(STYLES.as_bytes()).unwrap();
    zip.start_file("word/media/rId20.png", options).unwrap();
    zip.write_all(MEDIA).unwrap();
    zip.finish().unwrap();
}

fn read_entry(path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut out).unwrap();
    out
}

fn body(path: &Path) -> Element {
    let pkg = DocxPackage::open(path).unwrap();
    pkg.document().child("w:body").unwrap().clone()
}

fn paragraphs(body: &Element) -> Vec<&Element> {
    body.children_named("w:p").collect()
}

fn run_props(p: &Element) -> &Element {
    p.child("w:r").unwrap().child("w:rPr").unwrap()
}

fn child_val<'a>(e: &'a Element, name: &str) -> Option<&'a str> {
    e.child(name).and_then(|c| c.attr("w:val"))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn formats_every_element_kind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 4);

    let report = format_docx_file(&path, &FormattingOptions::default()).unwrap();
    assert_eq!(report.tables, 1);
    assert_eq!(report.table_rows, 4);
    assert_eq!(report.headings, 1);
    assert_eq!(report.code_blocks, 1);
    assert_eq!(report.images_centred, 1);
    assert_eq!(report.list_paragraphs, 1);

    let body = body(&path);
    let ps = paragraphs(&body);

    // Heading 1
    let heading = ps[0];
    assert_eq!(child_val(run_props(heading), "w:color"), Some("00528B"));
    let ppr = heading.child("w:pPr").unwrap();
    assert!(ppr.child("w:keepNext").is_some());
    assert!(ppr.child("w:keepLines").is_some());
    let spacing = ppr.child("w:spacing").unwrap();
    assert_eq!(spacing.attr("w:before"), Some("360"));
    assert_eq!(spacing.attr("w:after"), Some("120"));

    // Normal paragraph
    let normal = ps[1].child("w:pPr").unwrap();
    assert!(normal.child("w:widowControl").is_some());
    assert_eq!(normal.child("w:spacing").unwrap().attr("w:before"), Some("120"));

    // List paragraph
    let list = ps[2].child("w:pPr").unwrap();
    assert_eq!(list.child("w:spacing").unwrap().attr("w:after"), Some("40"));

    // Code block
    let code = ps[3];
    let code_ppr = code.child("w:pPr").unwrap();
    assert_eq!(code_ppr.child("w:shd").unwrap().attr("w:fill"), Some("F5F5F5"));
    let left = code_ppr.child("w:pBdr").unwrap().child("w:left").unwrap();
    assert_eq!(left.attr("w:sz"), Some("24"));
    assert_eq!(left.attr("w:color"), Some("CCCCCC"));
    let fonts = run_props(code).child("w:rFonts").unwrap();
    assert_eq!(fonts.attr("w:ascii"), Some("Consolas"));
    assert_eq!(fonts.attr("w:asciiTheme"), None);
    assert_eq!(child_val(run_props(code), "w:sz"), Some("18"));

    // Image paragraph
    assert_eq!(child_val(ps[4].child("w:pPr").unwrap(), "w:jc"), Some("center"));

    // Empty paragraph is left alone
    assert!(ps[5].child("w:pPr").is_none());
}

#[test]
fn table_header_zebra_rows_and_keep_together() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 4);
    format_docx_file(&path, &FormattingOptions::default()).unwrap();

    let body = body(&path);
    let tbl = body.child("w:tbl").unwrap();

    let tbl_pr = tbl.child("w:tblPr").unwrap();
    assert_eq!(child_val(tbl_pr, "w:tblStyle"), Some("Table"));
    assert_eq!(tbl_pr.child("w:tblW").unwrap().attr("w:type"), Some("auto"));
    assert_eq!(tbl_pr.child("w:tblLayout").unwrap().attr("w:type"), Some("autofit"));
    let borders = tbl_pr.child("w:tblBorders").unwrap();
    let names: Vec<&str> = borders.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"]
    );

    let rows: Vec<&Element> = tbl.children_named("w:tr").collect();
    let fills: Vec<&str> = rows
        .iter()
        .map(|tr| {
            tr.child("w:tc")
                .and_then(|tc| tc.child("w:tcPr"))
                .and_then(|pr| pr.child("w:shd"))
                .and_then(|shd| shd.attr("w:fill"))
                .unwrap()
        })
        .collect();
    assert_eq!(fills, ["0078D4", "FFFFFF", "F0F0F0", "FFFFFF"]);

    for tr in &rows {
        assert!(tr.child("w:trPr").unwrap().child("w:cantSplit").is_some());
    }

    let first_para = |tr: &Element| -> Element {
        tr.child("w:tc").unwrap().child("w:p").unwrap().clone()
    };

    let header = first_para(rows[0]);
    let header_rpr = run_props(&header);
    assert!(header_rpr.child("w:b").is_some());
    assert_eq!(child_val(header_rpr, "w:color"), Some("FFFFFF"));
    assert_eq!(child_val(header_rpr, "w:sz"), Some("20"));

    let data = first_para(rows[1]);
    assert_eq!(child_val(run_props(&data), "w:sz"), Some("18"));
    assert_eq!(child_val(run_props(&data), "w:color"), Some("000000"));

    // Four rows: the first three are kept with the next, the last is not.
    for (i, tr) in rows.iter().enumerate() {
        let p = first_para(tr);
        let keep = p.child("w:pPr").unwrap().child("w:keepNext").is_some();
        assert_eq!(keep, i < 3, "row {i}");
    }
}

#[test]
fn long_tables_only_link_the_first_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 20);
    format_docx_file(&path, &FormattingOptions::default()).unwrap();

    let body = body(&path);
    let tbl = body.child("w:tbl").unwrap();
    let kept: Vec<bool> = tbl
        .children_named("w:tr")
        .map(|tr| {
            tr.child("w:tc")
                .and_then(|tc| tc.child("w:p"))
                .and_then(|p| p.child("w:pPr"))
                .map(|ppr| ppr.child("w:keepNext").is_some())
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(kept.iter().filter(|k| **k).count(), 3);
    assert!(kept[0] && kept[1] && kept[2] && !kept[3]);
}

#[test]
fn table_formatting_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 3);

    let options = FormattingOptions {
        format_tables: false,
        ..FormattingOptions::default()
    };
    let report = format_docx_file(&path, &options).unwrap();
    assert_eq!(report.tables, 0);
    assert_eq!(report.headings, 1);

    let body = body(&path);
    let tbl_pr = body.child("w:tbl").unwrap().child("w:tblPr").unwrap();
    assert!(tbl_pr.child("w:tblBorders").is_none());
}

#[test]
fn other_package_entries_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 2);
    let styles_before = read_entry(&path, "word/styles.xml");

    format_docx_file(&path, &FormattingOptions::default()).unwrap();

    assert_eq!(read_entry(&path, "word/media/rId20.png"), MEDIA);
    assert_eq!(read_entry(&path, "word/styles.xml"), styles_before);
    assert_eq!(read_entry(&path, "[Content_Types].xml"), b"<Types/>");
}

#[test]
fn formatting_twice_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 5);

    format_docx_file(&path, &FormattingOptions::default()).unwrap();
    let once = read_entry(&path, "word/document.xml");
    format_docx_file(&path, &FormattingOptions::default()).unwrap();
    let twice = read_entry(&path, "word/document.xml");

    assert_eq!(
        String::from_utf8_lossy(&once),
        String::from_utf8_lossy(&twice)
    );
}

#[tokio::test]
async fn restyle_entry_point_formats_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.docx");
    write_docx(&path, 3);

    let config = ConversionConfig::builder()
        .table_keep_rows(1)
        .build()
        .unwrap();
    let report = restyle(&path, &config).await.unwrap();
    assert_eq!(report.tables, 1);

    // keep_rows = 1 makes a three-row table "long": min(3, n - 1) rows linked.
    let body = body(&path);
    let linked = body
        .child("w:tbl")
        .unwrap()
        .children_named("w:tr")
        .filter(|tr| {
            tr.child("w:tc")
                .and_then(|tc| tc.child("w:p"))
                .and_then(|p| p.child("w:pPr"))
                .is_some_and(|ppr| ppr.child("w:keepNext").is_some())
        })
        .count();
    assert_eq!(linked, 2);
}
