//! Post-processing rules for a pandoc-generated `word/document.xml`.
//!
//! Pandoc produces structurally correct but visually plain documents: tables
//! without borders, headings that can be stranded at the bottom of a page,
//! code blocks indistinguishable from body text. These rules fix that by
//! editing direct formatting on the body's paragraphs and tables.
//!
//! ## Rule Order
//!
//! 1. Tables: width, borders, pagination, header and zebra shading
//! 2. Centre paragraphs holding an inline image
//! 3. Headings: colour, keep-with-next, spacing per level
//! 4. Code blocks: monospace runs, shading, borders
//! 5. Widow control and list/body spacing
//!
//! Later rules overwrite spacing set by earlier ones, so a paragraph matching
//! both rule 4 and rule 5 ends up with rule 5's spacing.
//!
//! Rules apply to body-level paragraphs and tables only; paragraphs inside
//! table cells are touched by rule 1 alone.

use crate::config::FormattingOptions;
use crate::docx::package::DocxPackage;
use crate::docx::styles::StyleMap;
use crate::docx::xml::Element;
use crate::error::DocxError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// ── Schema child order ──────────────────────────────────────────────────────

pub(crate) const PPR_ORDER: &[&str] = &[
    "w:pStyle", "w:keepNext", "w:keepLines", "w:pageBreakBefore", "w:framePr",
    "w:widowControl", "w:numPr", "w:suppressLineNumbers", "w:pBdr", "w:shd",
    "w:tabs", "w:suppressAutoHyphens", "w:kinsoku", "w:wordWrap", "w:overflowPunct",
    "w:topLinePunct", "w:autoSpaceDE", "w:autoSpaceDN", "w:bidi", "w:adjustRightInd",
    "w:snapToGrid", "w:spacing", "w:ind", "w:contextualSpacing", "w:mirrorIndents",
    "w:suppressOverlap", "w:jc", "w:textDirection", "w:textAlignment",
    "w:textboxTightWrap", "w:outlineLvl", "w:divId", "w:cnfStyle", "w:rPr",
    "w:sectPr", "w:pPrChange",
];

pub(crate) const RPR_ORDER: &[&str] = &[
    "w:rStyle", "w:rFonts", "w:b", "w:bCs", "w:i", "w:iCs", "w:caps", "w:smallCaps",
    "w:strike", "w:dstrike", "w:outline", "w:shadow", "w:emboss", "w:imprint",
    "w:noProof", "w:snapToGrid", "w:vanish", "w:webHidden", "w:color", "w:spacing",
    "w:w", "w:kern", "w:position", "w:sz", "w:szCs", "w:highlight", "w:u", "w:effect",
    "w:bdr", "w:shd", "w:fitText", "w:vertAlign", "w:rtl", "w:cs", "w:em", "w:lang",
    "w:eastAsianLayout", "w:specVanish", "w:oMath",
];

pub(crate) const TBLPR_ORDER: &[&str] = &[
    "w:tblStyle", "w:tblpPr", "w:tblOverlap", "w:bidiVisual", "w:tblStyleRowBandSize",
    "w:tblStyleColBandSize", "w:tblW", "w:jc", "w:tblCellSpacing", "w:tblInd",
    "w:tblBorders", "w:shd", "w:tblLayout", "w:tblCellMar", "w:tblLook",
    "w:tblCaption", "w:tblDescription",
];

pub(crate) const TRPR_ORDER: &[&str] = &[
    "w:cnfStyle", "w:divId", "w:gridBefore", "w:gridAfter", "w:wBefore", "w:wAfter",
    "w:cantSplit", "w:trHeight", "w:tblHeader", "w:tblCellSpacing", "w:jc", "w:hidden",
];

pub(crate) const TCPR_ORDER: &[&str] = &[
    "w:cnfStyle", "w:tcW", "w:gridSpan", "w:hMerge", "w:vMerge", "w:tcBorders", "w:shd",
    "w:noWrap", "w:tcMar", "w:textDirection", "w:tcFitText", "w:vAlign", "w:hideMark",
];

// ── Palette ─────────────────────────────────────────────────────────────────

const HEADER_FILL: &str = "0078D4";
const HEADER_TEXT: &str = "FFFFFF";
const ZEBRA_EVEN: &str = "F0F0F0";
const ZEBRA_ODD: &str = "FFFFFF";
const DATA_TEXT: &str = "000000";
const CODE_TEXT: &str = "1E1E1E";
const CODE_FILL: &str = "F5F5F5";
const CODE_FONT: &str = "Consolas";

/// Colour and spacing (before, after; points) for heading levels 1-4.
const HEADINGS: [(&str, &str, u32, u32); 4] = [
    ("Heading 1", "00528B", 18, 6),
    ("Heading 2", "0078D4", 14, 4),
    ("Heading 3", "105E7E", 12, 4),
    ("Heading 4", "105E7E", 10, 3),
];

const CODE_STYLES: [&str; 4] = ["Source Code", "Verbatim Char", "Code", "SourceCode"];

/// What the formatter changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattingReport {
    pub tables: usize,
    pub table_rows: usize,
    pub images_centred: usize,
    pub headings: usize,
    pub code_blocks: usize,
    pub widow_controlled: usize,
    pub list_paragraphs: usize,
    pub body_paragraphs: usize,
}

/// Apply every rule to `body` (the `w:body` element) in order.
pub fn apply_formatting(
    body: &mut Element,
    styles: &StyleMap,
    options: &FormattingOptions,
) -> FormattingReport {
    let mut report = FormattingReport::default();

    if options.format_tables {
        for tbl in body.children_named_mut("w:tbl") {
            report.table_rows += format_table(tbl, options.table_keep_rows);
            report.tables += 1;
        }
    }

    for p in body.children_named_mut("w:p") {
        let style = styles.paragraph_style(p).to_string();

        if centre_image(p) {
            report.images_centred += 1;
        }
        if format_heading(p, &style) {
            report.headings += 1;
        }
        if format_code_block(p, &style) {
            report.code_blocks += 1;
        }
        fix_spacing(p, &style, &mut report);
    }

    debug!("Formatting report: {:?}", report);
    report
}

/// Open `path`, restyle it and write it back in place.
pub fn format_docx_file(
    path: &Path,
    options: &FormattingOptions,
) -> Result<FormattingReport, DocxError> {
    let mut package = DocxPackage::open(path)?;
    let report = {
        let (body, styles) = package.body_and_styles_mut()?;
        apply_formatting(body, styles, options)
    };
    package.save()?;
    info!(
        "Formatted {}: {} tables, {} headings, {} code blocks, {} images",
        path.display(),
        report.tables,
        report.headings,
        report.code_blocks,
        report.images_centred
    );
    Ok(report)
}

// ── Property helpers ────────────────────────────────────────────────────────

fn ppr(p: &mut Element) -> &mut Element {
    p.get_or_insert_leading_child("w:pPr", &[])
}

fn rpr(r: &mut Element) -> &mut Element {
    r.get_or_insert_leading_child("w:rPr", &[])
}

fn toggle(name: &str) -> Element {
    Element::new(name)
}

fn val(name: &str, value: &str) -> Element {
    Element::new(name).with_attr("w:val", value)
}

fn shading(fill: &str) -> Element {
    Element::new("w:shd")
        .with_attr("w:val", "clear")
        .with_attr("w:color", "auto")
        .with_attr("w:fill", fill)
}

fn border(name: &str, size: u32, space: u32, colour: &str) -> Element {
    Element::new(name)
        .with_attr("w:val", "single")
        .with_attr("w:sz", size.to_string())
        .with_attr("w:space", space.to_string())
        .with_attr("w:color", colour)
}

/// Paragraph spacing in points (stored as twentieths of a point).
fn set_spacing(p: &mut Element, before_pt: u32, after_pt: u32) {
    let spacing = ppr(p).get_or_insert_child("w:spacing", PPR_ORDER);
    for overriding in [
        "w:beforeAutospacing",
        "w:afterAutospacing",
        "w:beforeLines",
        "w:afterLines",
    ] {
        spacing.remove_attr(overriding);
    }
    spacing.set_attr("w:before", (before_pt * 20).to_string());
    spacing.set_attr("w:after", (after_pt * 20).to_string());
}

fn keep_together(p: &mut Element, with_next: bool) {
    let props = ppr(p);
    if with_next {
        props.set_child(toggle("w:keepNext"), PPR_ORDER);
    }
    props.set_child(toggle("w:keepLines"), PPR_ORDER);
}

/// Apply `f` to every direct run of `p`.
fn for_each_run(p: &mut Element, mut f: impl FnMut(&mut Element)) {
    for r in p.children_named_mut("w:r") {
        f(rpr(r));
    }
}

/// Size in points (stored as half-points).
fn set_run_size(rpr: &mut Element, pt: u32) {
    rpr.set_child(val("w:sz", &(pt * 2).to_string()), RPR_ORDER);
}

fn set_run_colour(rpr: &mut Element, colour: &str) {
    rpr.set_child(val("w:color", colour), RPR_ORDER);
}

fn set_run_font(rpr: &mut Element, font: &str) {
    let fonts = rpr.get_or_insert_child("w:rFonts", RPR_ORDER);
    fonts.remove_attr("w:asciiTheme");
    fonts.remove_attr("w:hAnsiTheme");
    fonts.set_attr("w:ascii", font);
    fonts.set_attr("w:hAnsi", font);
}

// ── Rule 1: Tables ──────────────────────────────────────────────────────────

/// Rows kept on the same page as their successor.
fn rows_to_link(rows: usize, keep_rows: usize) -> usize {
    if rows <= keep_rows {
        rows.saturating_sub(1)
    } else {
        3.min(rows - 1)
    }
}

/// Returns the number of rows formatted.
fn format_table(tbl: &mut Element, keep_rows: usize) -> usize {
    let tbl_pr = tbl.get_or_insert_leading_child("w:tblPr", &[]);
    tbl_pr.set_child(
        Element::new("w:tblW")
            .with_attr("w:type", "auto")
            .with_attr("w:w", "0"),
        TBLPR_ORDER,
    );
    tbl_pr.set_child(
        Element::new("w:tblLayout").with_attr("w:type", "autofit"),
        TBLPR_ORDER,
    );
    tbl_pr.set_child(
        Element::new("w:tblBorders")
            .with_child(border("w:top", 6, 0, "666666"))
            .with_child(border("w:left", 6, 0, "666666"))
            .with_child(border("w:bottom", 6, 0, "666666"))
            .with_child(border("w:right", 6, 0, "666666"))
            .with_child(border("w:insideH", 4, 0, "AAAAAA"))
            .with_child(border("w:insideV", 4, 0, "AAAAAA")),
        TBLPR_ORDER,
    );

    let rows = tbl.children_named("w:tr").count();
    let linked = rows_to_link(rows, keep_rows);

    for (i, tr) in tbl.children_named_mut("w:tr").enumerate() {
        tr.get_or_insert_leading_child("w:trPr", &["w:tblPrEx"])
            .set_child(toggle("w:cantSplit"), TRPR_ORDER);

        let fill = match i {
            0 => HEADER_FILL,
            n if n % 2 == 0 => ZEBRA_EVEN,
            _ => ZEBRA_ODD,
        };

        for tc in tr.children_named_mut("w:tc") {
            tc.get_or_insert_leading_child("w:tcPr", &[])
                .set_child(shading(fill), TCPR_ORDER);

            for p in tc.children_named_mut("w:p") {
                if i < linked {
                    keep_together(p, true);
                }
                if i == 0 {
                    for_each_run(p, |rpr| {
                        rpr.set_child(toggle("w:b"), RPR_ORDER);
                        set_run_colour(rpr, HEADER_TEXT);
                        set_run_size(rpr, 10);
                    });
                } else {
                    for_each_run(p, |rpr| {
                        set_run_size(rpr, 9);
                        set_run_colour(rpr, DATA_TEXT);
                    });
                }
            }
        }
    }
    rows
}

// ── Rule 2: Centre images ───────────────────────────────────────────────────

fn centre_image(p: &mut Element) -> bool {
    if !p.has_descendant("wp:inline") {
        return false;
    }
    ppr(p).set_child(val("w:jc", "center"), PPR_ORDER);
    true
}

// ── Rule 3: Headings ────────────────────────────────────────────────────────

fn format_heading(p: &mut Element, style: &str) -> bool {
    if !style.starts_with("Heading") {
        return false;
    }

    let level = HEADINGS.iter().find(|(name, ..)| *name == style);
    if let Some((_, colour, ..)) = level {
        for_each_run(p, |rpr| set_run_colour(rpr, colour));
    }

    keep_together(p, true);

    if let Some((_, _, before, after)) = level {
        set_spacing(p, *before, *after);
    }
    true
}

// ── Rule 4: Code blocks ─────────────────────────────────────────────────────

fn is_code_style(style: &str) -> bool {
    let lower = style.to_lowercase();
    CODE_STYLES.contains(&style) || lower.contains("code") || lower.contains("verbatim")
}

fn format_code_block(p: &mut Element, style: &str) -> bool {
    if !is_code_style(style) {
        return false;
    }

    set_spacing(p, 3, 3);
    keep_together(p, false);

    for_each_run(p, |rpr| {
        set_run_font(rpr, CODE_FONT);
        set_run_size(rpr, 9);
        set_run_colour(rpr, CODE_TEXT);
    });

    let props = ppr(p);
    props.set_child(shading(CODE_FILL), PPR_ORDER);
    props.set_child(
        Element::new("w:pBdr")
            .with_child(border("w:top", 4, 1, "E0E0E0"))
            .with_child(border("w:left", 24, 4, "CCCCCC"))
            .with_child(border("w:bottom", 4, 1, "E0E0E0"))
            .with_child(border("w:right", 4, 1, "E0E0E0")),
        PPR_ORDER,
    );
    true
}

// ── Rule 5: Widow control and spacing ───────────────────────────────────────

fn fix_spacing(p: &mut Element, style: &str, report: &mut FormattingReport) {
    if p.text().trim().is_empty() {
        return;
    }

    ppr(p).set_child(toggle("w:widowControl"), PPR_ORDER);
    report.widow_controlled += 1;

    if style.contains("List") {
        set_spacing(p, 2, 2);
        report.list_paragraphs += 1;
    } else if style == "Normal" {
        set_spacing(p, 6, 6);
        report.body_paragraphs += 1;
    }
}
