//! A small owned XML tree for WordprocessingML parts.
//!
//! Parts are read fully into memory, edited, and written back. Element and
//! attribute names are kept as written (`w:p`, `w:val`), so lookups use the
//! prefixed name. Every part pandoc writes binds the main namespace to `w:`.
//!
//! OOXML validates child order against the schema's `xsd:sequence`; Word
//! refuses to open a document whose `w:pPr` children are out of order. New
//! children are therefore inserted with [`Element::get_or_insert_child`],
//! which takes the parent's sequence as a slice of names.

use crate::error::DocxError;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set or overwrite an attribute, keeping the position of an existing one.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| k != name);
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.elements_mut().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Remove every direct child element called `name`.
    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.name == name));
    }

    /// `true` if any element below this one is called `name`.
    pub fn has_descendant(&self, name: &str) -> bool {
        self.elements()
            .any(|e| e.name == name || e.has_descendant(name))
    }

    /// Visible text: `w:t` content, with `w:tab` as a tab and `w:br`/`w:cr`
    /// as a newline.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.elements() {
            match child.name.as_str() {
                "w:t" => {
                    for n in &child.children {
                        if let Node::Text(t) | Node::CData(t) = n {
                            out.push_str(t);
                        }
                    }
                }
                "w:tab" => out.push('\t'),
                "w:br" | "w:cr" => out.push('\n'),
                _ => child.collect_text(out),
            }
        }
    }

    fn element_at_mut(&mut self, idx: usize) -> &mut Element {
        match &mut self.children[idx] {
            Node::Element(e) => e,
            _ => unreachable!("index {idx} does not hold an element"),
        }
    }

    /// Index at which a new `name` child belongs according to `order`.
    ///
    /// Names missing from `order` go to the end.
    fn ordered_position(&self, name: &str, order: &[&str]) -> usize {
        let Some(rank) = order.iter().position(|n| *n == name) else {
            return self.children.len();
        };
        self.children
            .iter()
            .position(|n| match n {
                Node::Element(e) => order
                    .iter()
                    .position(|o| *o == e.name)
                    .is_some_and(|r| r > rank),
                _ => false,
            })
            .unwrap_or(self.children.len())
    }

    /// The first `name` child, created empty in schema position if absent.
    pub fn get_or_insert_child(&mut self, name: &str, order: &[&str]) -> &mut Element {
        let existing = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name));
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let idx = self.ordered_position(name, order);
                self.children.insert(idx, Node::Element(Element::new(name)));
                idx
            }
        };
        self.element_at_mut(idx)
    }

    /// The first `name` child, created if absent directly after any leading
    /// elements named in `skip`.
    ///
    /// Property containers (`w:pPr`, `w:rPr`, `w:tcPr`, ...) come first in
    /// their parent, before any content.
    pub fn get_or_insert_leading_child(&mut self, name: &str, skip: &[&str]) -> &mut Element {
        let existing = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name));
        let idx = match existing {
            Some(idx) => idx,
            None => {
                let idx = self
                    .children
                    .iter()
                    .position(|n| matches!(n, Node::Element(e) if !skip.contains(&e.name.as_str())))
                    .unwrap_or(self.children.len());
                self.children.insert(idx, Node::Element(Element::new(name)));
                idx
            }
        };
        self.element_at_mut(idx)
    }

    /// Replace every child with `child`'s name by `child`, in schema position.
    pub fn set_child(&mut self, child: Element, order: &[&str]) -> &mut Element {
        self.remove_children(&child.name);
        let idx = self.ordered_position(&child.name, order);
        self.children.insert(idx, Node::Element(child));
        self.element_at_mut(idx)
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

fn xml_err(part: &str, e: impl Display) -> DocxError {
    DocxError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    }
}

fn element_from_start(part: &str, e: &BytesStart<'_>) -> Result<Element, DocxError> {
    let mut el = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_err(part, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| xml_err(part, err))?
            .into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if let Node::Element(e) = node {
                root.get_or_insert(e);
            }
        }
    }
}

/// Parse a complete XML part into its root element.
///
/// `part` is the package path, used in error messages.
pub fn parse(part: &str, xml: &str) -> Result<Element, DocxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(element_from_start(part, &e)?),
            Ok(Event::Empty(e)) => {
                let el = element_from_start(part, &e)?;
                attach(&mut stack, &mut root, Node::Element(el));
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| xml_err(part, "unbalanced end tag"))?;
                attach(&mut stack, &mut root, Node::Element(el));
            }
            Ok(Event::Text(t)) => {
                if !stack.is_empty() {
                    let text = t.unescape().map_err(|err| xml_err(part, err))?;
                    attach(&mut stack, &mut root, Node::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                attach(&mut stack, &mut root, Node::CData(text));
            }
            Ok(Event::Comment(c)) => {
                if !stack.is_empty() {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    attach(&mut stack, &mut root, Node::Comment(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(part, e)),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(xml_err(part, format!("unclosed element <{}>", stack[stack.len() - 1].name)));
    }
    root.ok_or_else(|| xml_err(part, "no root element"))
}

// ── Serialisation ───────────────────────────────────────────────────────────

fn write_element<W: std::io::Write>(
    part: &str,
    writer: &mut Writer<W>,
    el: &Element,
) -> Result<(), DocxError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if el.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| xml_err(part, e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| xml_err(part, e))?;
    for child in &el.children {
        let event = match child {
            Node::Element(e) => {
                write_element(part, writer, e)?;
                continue;
            }
            Node::Text(t) => Event::Text(BytesText::new(t)),
            Node::CData(t) => Event::CData(BytesCData::new(t.as_str())),
            Node::Comment(t) => Event::Comment(BytesText::from_escaped(t.as_str())),
        };
        writer.write_event(event).map_err(|e| xml_err(part, e))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(|e| xml_err(part, e))
}

/// Serialise `root` as a standalone UTF-8 part.
pub fn to_bytes(part: &str, root: &Element) -> Result<Vec<u8>, DocxError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(|e| xml_err(part, e))?;
    writer
        .write_event(Event::Text(BytesText::from_escaped("\r\n")))
        .map_err(|e| xml_err(part, e))?;
    write_element(part, &mut writer, root)?;
    Ok(writer.into_inner().into_inner())
}
