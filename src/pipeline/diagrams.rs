//! Mermaid block discovery and substitution.
//!
//! Blocks are located with a single non-greedy regex over the whole document,
//! so the N-th match is always the N-th block in reading order. The same
//! ordering is used when the blocks are later replaced by image references,
//! which keeps `diagram-N.png` aligned with the block it came from.

use crate::pipeline::sizing::ImageSize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

static RE_MERMAID_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid\r?\n(.*?)```").unwrap());

/// One fenced ```` ```mermaid ```` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MermaidBlock {
    /// 0-based position in the document.
    pub index: usize,
    /// Diagram source between the fences.
    pub body: String,
    /// Byte span of the whole block, fences included.
    pub span: Range<usize>,
}

impl MermaidBlock {
    /// 1-based diagram number used in file names and captions.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Find every Mermaid block in `content`, in document order.
pub fn find_mermaid_blocks(content: &str) -> Vec<MermaidBlock> {
    RE_MERMAID_BLOCK
        .captures_iter(content)
        .enumerate()
        .filter_map(|(index, caps)| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?;
            Some(MermaidBlock {
                index,
                body: body.as_str().to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Replace the i-th Mermaid block with `replacements[i]`.
///
/// Blocks beyond the end of `replacements` are left as they are.
pub fn replace_mermaid_blocks(content: &str, replacements: &[String]) -> String {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;

    for (i, m) in RE_MERMAID_BLOCK.find_iter(content).enumerate() {
        let Some(replacement) = replacements.get(i) else {
            break;
        };
        out.push_str(&content[last..m.start()]);
        out.push_str(replacement);
        last = m.end();
    }

    out.push_str(&content[last..]);
    out
}

/// File name of the N-th (1-based) rendered diagram.
pub fn diagram_file_name(number: usize) -> String {
    format!("diagram-{number}.png")
}

/// `![Diagram N](images/diagram-N.png){width=5.0in}`.
///
/// `size` is `None` when rendering failed: the link is still emitted so the
/// document shows where the diagram belongs.
pub fn diagram_reference(number: usize, images_dir: &str, size: Option<&ImageSize>) -> String {
    let attr = size.map(ImageSize::attribute).unwrap_or_default();
    format!(
        "![Diagram {number}]({}/{}){attr}",
        images_dir.trim_end_matches(['/', '\\']),
        diagram_file_name(number)
    )
}

// ── Classification ──────────────────────────────────────────────────────────

/// Diagram type, from the first keyword of the Mermaid source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Pie,
    Journey,
    GitGraph,
    Mindmap,
    Timeline,
    Other,
}

impl DiagramKind {
    /// Classify a diagram body. Leading blank lines, `%%` comments and a
    /// `---` front-matter block are skipped.
    pub fn detect(body: &str) -> Self {
        let mut in_front_matter = false;
        for (i, line) in body.lines().enumerate() {
            let line = line.trim();
            if line == "---" && (i == 0 || in_front_matter) {
                in_front_matter = !in_front_matter;
                continue;
            }
            if in_front_matter || line.is_empty() || line.starts_with("%%") {
                continue;
            }
            let keyword = line
                .split(|c: char| c.is_whitespace() || c == ';')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            return Self::from_keyword(&keyword);
        }
        DiagramKind::Other
    }

    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "graph" | "flowchart" => DiagramKind::Flowchart,
            "sequencediagram" => DiagramKind::Sequence,
            "classdiagram" | "classdiagram-v2" => DiagramKind::Class,
            "statediagram" | "statediagram-v2" => DiagramKind::State,
            "erdiagram" => DiagramKind::EntityRelationship,
            "gantt" => DiagramKind::Gantt,
            "pie" => DiagramKind::Pie,
            "journey" => DiagramKind::Journey,
            "gitgraph" => DiagramKind::GitGraph,
            "mindmap" => DiagramKind::Mindmap,
            "timeline" => DiagramKind::Timeline,
            _ => DiagramKind::Other,
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "er",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Pie => "pie",
            DiagramKind::Journey => "journey",
            DiagramKind::GitGraph => "git",
            DiagramKind::Mindmap => "mindmap",
            DiagramKind::Timeline => "timeline",
            DiagramKind::Other => "other",
        })
    }
}
