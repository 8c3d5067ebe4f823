//! Preprocessing: line-level Markdown fixes applied before pandoc sees the
//! document.
//!
//! Hand-written Markdown often relies on renderers that are more forgiving
//! than pandoc. A bullet list glued to the paragraph above it, or a heading
//! immediately followed by text, is rendered by pandoc as one run-on
//! paragraph. GitHub task-list checkboxes are not understood by the DOCX
//! writer at all.
//!
//! ## Rules
//!
//! Pass 1, over the input lines:
//! 1. Blank line before a list item that follows ordinary text
//! 2. Blank line after a heading line followed by non-blank text
//! 3. `- [ ]` → `- ☐` and `- [x]` → `- ☑`
//!
//! Pass 2, over the result:
//! 4. Blank line after a list item followed by ordinary text
//!
//! Lines inside fenced code blocks (```` ``` ```` or `~~~`) are passed
//! through verbatim, so a `# comment` in a shell snippet is not taken for a
//! heading.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all preprocessing rules. Splits on `\n` and re-joins with `\n`, so a
/// trailing newline in the input is preserved.
pub fn preprocess_markdown(input: &str) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let pass1 = insert_spacing_and_checkboxes(&lines);
    let refs: Vec<&str> = pass1.iter().map(String::as_str).collect();
    close_lists(&refs).join("\n")
}

// ── List / heading detection ────────────────────────────────────────────────

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*+]\s|^\d+\.\s|^[-*+]\s*\[[ xX]\]").unwrap());

static RE_LIST_ITEM_CHECKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*+]\s|^\d+\.\s|^[-*+]\s*[☐☑]").unwrap());

static RE_OPEN_CHECKBOX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*[-*+])\s*\[ \]").unwrap());

static RE_DONE_CHECKBOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*[-*+])\s*\[[xX]\]").unwrap());

fn is_list_item(stripped: &str) -> bool {
    RE_LIST_ITEM.is_match(stripped)
}

fn is_list_item_after_checkboxes(stripped: &str) -> bool {
    RE_LIST_ITEM_CHECKED.is_match(stripped)
}

// ── Fence tracking ──────────────────────────────────────────────────────────

/// `true` for every line that belongs to a fenced block's body, including the
/// closing fence. Opening fences are ordinary lines.
fn verbatim_mask(lines: &[&str]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut open: Option<&'static str> = None;

    for line in lines {
        let stripped = line.trim();
        match open {
            Some(marker) => {
                mask.push(true);
                if stripped.starts_with(marker) {
                    open = None;
                }
            }
            None => {
                mask.push(false);
                if stripped.starts_with("```") {
                    open = Some("```");
                } else if stripped.starts_with("~~~") {
                    open = Some("~~~");
                }
            }
        }
    }
    mask
}

// ── Rules 1-3 ───────────────────────────────────────────────────────────────

fn insert_spacing_and_checkboxes(lines: &[&str]) -> Vec<String> {
    let verbatim = verbatim_mask(lines);
    let mut result: Vec<String> = Vec::with_capacity(lines.len() + lines.len() / 4);
    let mut prev_was_list = false;
    let mut prev_was_blank = false;

    for (i, &line) in lines.iter().enumerate() {
        let stripped = line.trim();
        let is_blank = stripped.is_empty();

        if verbatim[i] {
            result.push(line.to_string());
            prev_was_list = false;
            prev_was_blank = is_blank;
            continue;
        }

        let is_list = is_list_item(stripped);

        if is_list && !prev_was_list && !prev_was_blank && !result.is_empty() {
            result.push(String::new());
        }

        if i > 0 && !is_blank {
            let prev_input = lines[i - 1].trim();
            let last_is_blank = result.last().is_some_and(|l| l.is_empty());
            if prev_input.starts_with('#') && !verbatim[i - 1] && !last_is_blank {
                result.push(String::new());
            }
        }

        result.push(rewrite_checkbox(line));
        prev_was_list = is_list;
        prev_was_blank = is_blank;
    }

    result
}

fn rewrite_checkbox(line: &str) -> String {
    if RE_OPEN_CHECKBOX.is_match(line) {
        RE_OPEN_CHECKBOX.replace(line, "${1} ☐").into_owned()
    } else if RE_DONE_CHECKBOX.is_match(line) {
        RE_DONE_CHECKBOX.replace(line, "${1} ☑").into_owned()
    } else {
        line.to_string()
    }
}

// ── Rule 4: Close lists ─────────────────────────────────────────────────────

fn close_lists(lines: &[&str]) -> Vec<String> {
    let verbatim = verbatim_mask(lines);
    let mut out = Vec::with_capacity(lines.len());

    for (i, &line) in lines.iter().enumerate() {
        out.push(line.to_string());
        if verbatim[i] || !is_list_item_after_checkboxes(line.trim()) {
            continue;
        }
        if let Some(next) = lines.get(i + 1) {
            let next = next.trim();
            if !next.is_empty() && !is_list_item_after_checkboxes(next) {
                out.push(String::new());
            }
        }
    }
    out
}
