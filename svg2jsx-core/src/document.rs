//! Document Model - In-memory SVG tree
//!
//! Parsing goes through `quick-xml`; serialization is hand-rolled so the
//! pipeline controls pretty-printing and indentation.

use quick_xml::escape::{escape, partial_escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML parse error at position {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Malformed attribute: {0}")]
    Attribute(String),

    #[error("Unexpected end tag: </{0}>")]
    UnexpectedEnd(String),

    #[error("Unclosed element: <{0}>")]
    Unclosed(String),

    #[error("Document has no root element")]
    NoRoot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    /// `<?xml ...?>`
    Declaration(String),
    /// Any other processing instruction.
    Instruction(String),
    Doctype(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: vec![],
            children: vec![],
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Set an attribute, replacing the value in place if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(idx).value)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text content of direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Pre-order traversal over this element and every descendant element.
    pub fn walk<F: FnMut(&Element)>(&self, f: &mut F) {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }

    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.walk_mut(f);
            }
        }
    }

    /// Drop descendant nodes rejected by `keep`, at every depth.
    pub fn retain_nodes<F: FnMut(&Node) -> bool>(&mut self, keep: &mut F) {
        self.children.retain(|node| keep(node));
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.retain_nodes(keep);
            }
        }
    }
}

/// Formatting options for [`Document::to_svg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    pub pretty: bool,
    pub indent: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Top-level nodes: prolog, comments and the root element.
    pub children: Vec<Node>,
}

impl Document {
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(source);
        let mut doc = Document::default();
        let mut stack: Vec<Element> = vec![];

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(DocumentError::Xml {
                        position: reader.error_position() as u64,
                        message: e.to_string(),
                    })
                }
            };

            match event {
                Event::Start(e) => stack.push(start_element(&e)?),
                Event::Empty(e) => {
                    let element = start_element(&e)?;
                    push_node(&mut stack, &mut doc, Node::Element(element));
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let mut element = match stack.pop() {
                        Some(el) if el.name == name => el,
                        _ => return Err(DocumentError::UnexpectedEnd(name)),
                    };
                    let preserve = preserves_space(&element)
                        || stack.iter().any(|el| el.attr("xml:space") == Some("preserve"));
                    if !preserve {
                        normalize_text(&mut element);
                    }
                    push_node(&mut stack, &mut doc, Node::Element(element));
                }
                Event::Text(t) => {
                    let raw = String::from_utf8_lossy(&t);
                    push_text(&mut stack, unescape_lossy(&raw));
                }
                Event::GeneralRef(r) => {
                    let raw = format!("&{};", String::from_utf8_lossy(&r));
                    push_text(&mut stack, unescape_lossy(&raw));
                }
                Event::CData(c) => push_node(&mut stack, &mut doc, Node::CData(lossy(&c))),
                Event::Comment(c) => push_node(&mut stack, &mut doc, Node::Comment(lossy(&c))),
                Event::Decl(d) => push_node(&mut stack, &mut doc, Node::Declaration(lossy(&d))),
                Event::PI(p) => push_node(&mut stack, &mut doc, Node::Instruction(lossy(&p))),
                Event::DocType(d) => {
                    push_node(&mut stack, &mut doc, Node::Doctype(lossy(&d).trim().to_string()))
                }
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.pop() {
            return Err(DocumentError::Unclosed(open.name));
        }
        if doc.root().is_none() {
            return Err(DocumentError::NoRoot);
        }
        Ok(doc)
    }

    pub fn root(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Visit every element in document order.
    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        for node in &mut self.children {
            if let Node::Element(el) = node {
                el.walk_mut(f);
            }
        }
    }

    pub fn walk<F: FnMut(&Element)>(&self, f: &mut F) {
        for node in &self.children {
            if let Node::Element(el) = node {
                el.walk(f);
            }
        }
    }

    /// Drop nodes rejected by `keep` at the top level and at every depth.
    pub fn retain_nodes<F: FnMut(&Node) -> bool>(&mut self, mut keep: F) {
        self.children.retain(|node| keep(node));
        for node in &mut self.children {
            if let Node::Element(el) = node {
                el.retain_nodes(&mut keep);
            }
        }
    }

    pub fn to_svg(&self, options: &SerializeOptions) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(&mut out, node, 0, options);
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn unescape_lossy(raw: &str) -> String {
    unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DocumentError::Attribute(err.to_string()))?;
        let raw = String::from_utf8_lossy(&attr.value);
        element.attributes.push(Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: unescape_lossy(&raw),
        });
    }
    Ok(element)
}

fn push_node(stack: &mut [Element], doc: &mut Document, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => doc.children.push(node),
    }
}

// Text outside the root element is insignificant and dropped.
fn push_text(stack: &mut [Element], text: String) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    match parent.children.last_mut() {
        Some(Node::Text(existing)) => existing.push_str(&text),
        _ => parent.children.push(Node::Text(text)),
    }
}

/// Text-content elements, `xml:space="preserve"` and mixed content keep
/// their text verbatim; whitespace there separates words.
fn preserves_space(element: &Element) -> bool {
    if TEXT_CONTENT.contains(&element.name.as_str())
        || element.attr("xml:space") == Some("preserve")
    {
        return true;
    }
    let has_elements = element.children.iter().any(|n| matches!(n, Node::Element(_)));
    has_elements
        && element
            .children
            .iter()
            .any(|n| matches!(n, Node::Text(t) if !t.trim().is_empty()))
}

const TEXT_CONTENT: &[&str] = &["text", "tspan", "textPath"];

fn normalize_text(element: &mut Element) {
    element.children.retain_mut(|node| match node {
        Node::Text(t) => {
            let trimmed = t.trim();
            if trimmed.len() != t.len() {
                *t = trimmed.to_string();
            }
            !t.is_empty()
        }
        _ => true,
    });
}

fn write_node(out: &mut String, node: &Node, depth: usize, options: &SerializeOptions) {
    let pad = if options.pretty {
        " ".repeat(depth * options.indent)
    } else {
        String::new()
    };
    let newline = if options.pretty { "\n" } else { "" };

    match node {
        Node::Element(el) => write_element(out, el, depth, options),
        Node::Text(t) => {
            out.push_str(&pad);
            out.push_str(&partial_escape(t.as_str()));
            out.push_str(newline);
        }
        Node::CData(c) => out.push_str(&format!("{pad}<![CDATA[{c}]]>{newline}")),
        Node::Comment(c) => out.push_str(&format!("{pad}<!--{c}-->{newline}")),
        Node::Declaration(d) | Node::Instruction(d) => {
            out.push_str(&format!("{pad}<?{d}?>{newline}"))
        }
        Node::Doctype(d) => out.push_str(&format!("{pad}<!DOCTYPE {d}>{newline}")),
    }
}

fn write_element(out: &mut String, el: &Element, depth: usize, options: &SerializeOptions) {
    let pad = if options.pretty {
        " ".repeat(depth * options.indent)
    } else {
        String::new()
    };
    let newline = if options.pretty { "\n" } else { "" };

    out.push_str(&pad);
    out.push('<');
    out.push_str(&el.name);
    for attr in &el.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape(attr.value.as_str()));
        out.push('"');
    }

    if el.children.is_empty() {
        out.push_str("/>");
        out.push_str(newline);
        return;
    }

    // Text content stays on the element's line; padding would change it.
    if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
        let inline = SerializeOptions {
            pretty: false,
            ..*options
        };
        out.push('>');
        for child in &el.children {
            write_node(out, child, 0, &inline);
        }
        out.push_str(&format!("</{}>{newline}", el.name));
        return;
    }

    out.push('>');
    out.push_str(newline);
    for child in &el.children {
        write_node(out, child, depth + 1, options);
    }
    out.push_str(&format!("{pad}</{}>{newline}", el.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICON: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- Generator: Sketch -->
<svg width="24" height="24" xmlns="http://www.w3.org/2000/svg">
    <title>Icon &amp; Name</title>
    <g id="Page-1">
        <path d="M0 0h24v24H0z"/>
    </g>
</svg>"#;

    #[test]
    fn test_parse_structure() {
        let doc = Document::parse(ICON).unwrap();
        assert!(matches!(doc.children[0], Node::Declaration(_)));
        assert!(matches!(doc.children[1], Node::Comment(_)));

        let root = doc.root().unwrap();
        assert_eq!(root.name, "svg");
        assert_eq!(root.attr("width"), Some("24"));

        let title = root.child_elements().next().unwrap();
        assert_eq!(title.text(), "Icon & Name");
    }

    #[test]
    fn test_pretty_output() {
        let doc = Document::parse(r#"<svg><g><path d="M0 0"/></g></svg>"#).unwrap();
        let out = doc.to_svg(&SerializeOptions { pretty: true, indent: 2 });
        assert_eq!(out, "<svg>\n  <g>\n    <path d=\"M0 0\"/>\n  </g>\n</svg>");
    }

    #[test]
    fn test_compact_output_escapes() {
        let doc = Document::parse(r#"<svg data-x="a&quot;b"><text>1 &lt; 2</text></svg>"#).unwrap();
        let out = doc.to_svg(&SerializeOptions { pretty: false, indent: 2 });
        assert_eq!(out, r#"<svg data-x="a&quot;b"><text>1 &lt; 2</text></svg>"#);
    }

    #[test]
    fn test_reparse_is_stable() {
        let options = SerializeOptions::default();
        let first = Document::parse(ICON).unwrap();
        let second = Document::parse(&first.to_svg(&options)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mixed_content_keeps_word_spacing() {
        let source = "<svg><text>Hello <tspan>World</tspan> again</text></svg>";
        let doc = Document::parse(source).unwrap();
        let compact = SerializeOptions { pretty: false, indent: 2 };
        assert_eq!(doc.to_svg(&compact), source);

        let pretty = doc.to_svg(&SerializeOptions::default());
        assert_eq!(
            pretty,
            "<svg>\n  <text>Hello <tspan>World</tspan> again</text>\n</svg>"
        );
        assert_eq!(Document::parse(&pretty).unwrap(), doc);
    }

    #[test]
    fn test_text_elements_and_preserve_keep_whitespace() {
        let doc = Document::parse(
            r#"<svg><text><tspan>A</tspan> <tspan>B</tspan></text><g xml:space="preserve"><desc> x </desc></g></svg>"#,
        )
        .unwrap();
        let root = doc.root().unwrap();
        let text = root.child_elements().next().unwrap();
        assert_eq!(text.text(), " ");
        let desc = root.child_elements().nth(1).unwrap().child_elements().next().unwrap();
        assert_eq!(desc.text(), " x ");

        let formatted = Document::parse("<svg>\n  <title> Badge </title>\n</svg>").unwrap();
        assert_eq!(formatted.root().unwrap().children.len(), 1);
        assert_eq!(formatted.root().unwrap().child_elements().next().unwrap().text(), "Badge");
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(Document::parse("<svg><g></svg>").is_err());
        assert!(matches!(
            Document::parse("<!-- nothing -->"),
            Err(DocumentError::NoRoot)
        ));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let mut el = Element::new("rect");
        el.set_attr("x", "1");
        el.set_attr("y", "2");
        el.set_attr("x", "3");
        assert_eq!(el.attr("x"), Some("3"));
        assert_eq!(el.attributes[0].name, "x");
        assert_eq!(el.remove_attr("y").as_deref(), Some("2"));
        assert!(!el.has_attr("y"));
    }
}
