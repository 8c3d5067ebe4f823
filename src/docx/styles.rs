//! Paragraph style names from `word/styles.xml`.
//!
//! Paragraphs reference styles by id (`w:pStyle w:val="Heading1"`), but the
//! formatting rules match on display names (`Heading 1`, `Source Code`). The
//! built-in names Word stores in lower case (`heading 1`, `normal`) are
//! reported capitalised, the way Word's UI shows them.

use crate::docx::xml::Element;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StyleMap {
    names: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleMap {
    /// Build from the root `w:styles` element.
    pub fn from_styles(root: &Element) -> Self {
        let mut map = StyleMap::default();
        for style in root.children_named("w:style") {
            let Some(id) = style.attr("w:styleId") else {
                continue;
            };
            let name = style
                .child("w:name")
                .and_then(|n| n.attr("w:val"))
                .map(ui_name)
                .unwrap_or_else(|| id.to_string());

            let is_paragraph = style.attr("w:type").is_none_or(|t| t == "paragraph");
            let is_default = matches!(style.attr("w:default"), Some("1" | "true" | "on"));
            if is_paragraph && is_default && map.default_paragraph.is_none() {
                map.default_paragraph = Some(name.clone());
            }
            map.names.insert(id.to_string(), name);
        }
        map
    }

    /// Display name for `style_id`, or the id itself if it is not defined.
    pub fn name<'a>(&'a self, style_id: &'a str) -> &'a str {
        self.names.get(style_id).map_or(style_id, String::as_str)
    }

    /// Name of the style a paragraph without `w:pStyle` uses.
    pub fn default_paragraph_name(&self) -> &str {
        self.default_paragraph.as_deref().unwrap_or("Normal")
    }

    /// Display style name of a `w:p`.
    pub fn paragraph_style<'a>(&'a self, p: &'a Element) -> &'a str {
        p.child("w:pPr")
            .and_then(|ppr| ppr.child("w:pStyle"))
            .and_then(|s| s.attr("w:val"))
            .map_or_else(|| self.default_paragraph_name(), |id| self.name(id))
    }
}

/// `heading 1` → `Heading 1`; names Word does not lower-case pass through.
fn ui_name(raw: &str) -> String {
    const LOWERCASE_BUILTINS: &[&str] = &["caption", "footer", "header", "normal", "title"];

    let is_builtin = raw.starts_with("heading ") || LOWERCASE_BUILTINS.contains(&raw);
    if !is_builtin {
        return raw.to_string();
    }

    let mut chars = raw.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
