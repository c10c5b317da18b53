//! JSX Components - Optimized markup rendered as functional components
//!
//! The converter reparses the optimized markup and writes it back out as
//! JSX: attribute names in React's camelCase, `style` as an object literal,
//! comments dropped, and text that JSX would misread wrapped in a string
//! expression.

use serde_json::Value;
use thiserror::Error;

use crate::document::{Attribute, Document, DocumentError, Element, Node};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid markup: {0}")]
    Markup(#[from] DocumentError),

    #[error("Markup has no root element")]
    NoRoot,
}

/// Turns optimized markup into the body of a component.
pub trait ComponentConverter: Send + Sync {
    fn convert(&self, markup: &str) -> Result<String, ConvertError>;
}

/// A named component ready to be written into a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsxConverter {
    pub indent: usize,
}

impl Default for JsxConverter {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl JsxConverter {
    pub fn new(indent: usize) -> Self {
        Self { indent }
    }

    fn write_open_tag(&self, out: &mut String, el: &Element) {
        out.push('<');
        out.push_str(&el.name);
        for attr in &el.attributes {
            out.push(' ');
            out.push_str(&jsx_attribute(attr));
        }
    }

    fn write_element(&self, out: &mut String, el: &Element, depth: usize) {
        let pad = " ".repeat(depth * self.indent);
        out.push_str(&pad);

        let children = jsx_children(el);
        if children.is_empty() {
            self.write_open_tag(out, el);
            out.push_str(" />\n");
            return;
        }

        // Anything holding text goes on one line so word spacing survives.
        if children.iter().any(|n| matches!(n, Node::Text(_) | Node::CData(_))) {
            self.write_inline(out, el);
            out.push('\n');
            return;
        }

        self.write_open_tag(out, el);
        out.push_str(">\n");
        for node in children {
            if let Node::Element(child) = node {
                self.write_element(out, child, depth + 1);
            }
        }
        out.push_str(&pad);
        out.push_str(&format!("</{}>\n", el.name));
    }

    fn write_inline(&self, out: &mut String, el: &Element) {
        self.write_open_tag(out, el);
        let children = jsx_children(el);
        if children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for node in children {
            match node {
                Node::Element(child) => self.write_inline(out, child),
                Node::Text(text) | Node::CData(text) => out.push_str(&jsx_text(text)),
                _ => {}
            }
        }
        out.push_str(&format!("</{}>", el.name));
    }
}

fn jsx_children(el: &Element) -> Vec<&Node> {
    el.children
        .iter()
        .filter(|n| matches!(n, Node::Element(_) | Node::Text(_) | Node::CData(_)))
        .collect()
}

impl ComponentConverter for JsxConverter {
    fn convert(&self, markup: &str) -> Result<String, ConvertError> {
        let doc = Document::parse(markup)?;
        let root = doc.root().ok_or(ConvertError::NoRoot)?;

        let mut out = String::new();
        self.write_element(&mut out, root, 0);
        out.truncate(out.trim_end().len());
        Ok(out)
    }
}

/// `stroke-width` -> `strokeWidth`, `xlink:href` -> `xlinkHref`.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' || c == ':' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn jsx_attribute_name(name: &str) -> String {
    match name {
        "class" => "className".to_string(),
        "for" => "htmlFor".to_string(),
        n if n.starts_with("data-") || n.starts_with("aria-") => n.to_string(),
        n => camel_case(n),
    }
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// `fill-rule: evenodd; stroke: none` -> `{ fillRule: "evenodd", stroke: "none" }`
fn style_object(style: &str) -> Option<String> {
    let mut entries = vec![];
    let parts = declarations(style);
    for declaration in parts.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        let (property, value) = declaration.split_once(':')?;
        let property = property.trim();
        let key = if property.starts_with("--") {
            js_string(property)
        } else {
            camel_case(property)
        };
        entries.push(format!("{key}: {}", js_string(value.trim())));
    }
    Some(format!("{{ {} }}", entries.join(", ")))
}

/// Split on `;` outside parentheses and quotes, so `url(data:a;base64,..)`
/// stays one declaration.
fn declarations(style: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

fn jsx_attribute(attr: &Attribute) -> String {
    if attr.name == "style" {
        if let Some(object) = style_object(&attr.value) {
            return format!("style={{{object}}}");
        }
    }

    let name = jsx_attribute_name(&attr.name);
    if attr.value.contains(['"', '&']) {
        format!("{name}={{{}}}", js_string(&attr.value))
    } else {
        format!("{name}=\"{}\"", attr.value)
    }
}

fn jsx_text(text: &str) -> String {
    if text.contains(['{', '}', '<', '>', '&']) {
        format!("{{{}}}", js_string(text))
    } else {
        text.to_string()
    }
}

/// Wrap converted JSX in a functional component declaration.
pub fn render_component(name: &str, jsx: &str) -> Component {
    let body: Vec<String> = jsx
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect();

    Component {
        name: name.to_string(),
        source: format!("const {name} = () => (\n{}\n);\n", body.join("\n")),
    }
}

/// Module text: every component in order, then one export line.
pub fn render_module(components: &[Component]) -> String {
    let mut out = String::new();
    for component in components {
        out.push_str(&component.source);
        out.push('\n');
    }
    let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
    out.push_str(&format!("export {{ {} }};\n", names.join(", ")));
    out
}
