//! Removal passes - prolog, editor metadata, empty nodes, unwanted attributes

use regex::Regex;
use serde_json::json;
use std::collections::HashSet;

use super::params;
use crate::document::{Document, Element, Node};
use crate::plugins::{bool_param, str_list_param, str_param, Params, Plugin, PluginError};

fn remove_elements_named(doc: &mut Document, name: &str) {
    doc.retain_nodes(|node| !matches!(node, Node::Element(el) if el.name == name));
}

pub struct RemoveDoctype;

impl Plugin for RemoveDoctype {
    fn name(&self) -> &str {
        "removeDoctype"
    }

    fn description(&self) -> &str {
        "removes doctype declaration"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        doc.retain_nodes(|node| !matches!(node, Node::Doctype(_)));
        Ok(())
    }
}

pub struct RemoveXmlProcInst;

impl Plugin for RemoveXmlProcInst {
    fn name(&self) -> &str {
        "removeXMLProcInst"
    }

    fn description(&self) -> &str {
        "removes XML processing instructions"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        doc.retain_nodes(|node| !matches!(node, Node::Declaration(_)));
        Ok(())
    }
}

pub struct RemoveComments;

impl Plugin for RemoveComments {
    fn name(&self) -> &str {
        "removeComments"
    }

    fn description(&self) -> &str {
        "removes comments, keeping `<!--! ... -->` legal notices"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        doc.retain_nodes(|node| match node {
            Node::Comment(text) => text.starts_with('!'),
            _ => true,
        });
        Ok(())
    }
}

pub struct RemoveMetadata;

impl Plugin for RemoveMetadata {
    fn name(&self) -> &str {
        "removeMetadata"
    }

    fn description(&self) -> &str {
        "removes <metadata>"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        remove_elements_named(doc, "metadata");
        Ok(())
    }
}

pub struct RemoveTitle;

impl Plugin for RemoveTitle {
    fn name(&self) -> &str {
        "removeTitle"
    }

    fn description(&self) -> &str {
        "removes <title>"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        remove_elements_named(doc, "title");
        Ok(())
    }
}

pub struct RemoveDesc;

impl Plugin for RemoveDesc {
    fn name(&self) -> &str {
        "removeDesc"
    }

    fn description(&self) -> &str {
        "removes empty or editor-generated <desc>"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({ "removeAny": false })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let remove_any = bool_param(params, "removeAny", false)?;
        doc.retain_nodes(|node| match node {
            Node::Element(el) if el.name == "desc" => {
                let text = el.text();
                let text = text.trim();
                !(remove_any
                    || text.is_empty()
                    || text.starts_with("Created with")
                    || text.starts_with("Created using"))
            }
            _ => true,
        });
        Ok(())
    }
}

const EDITOR_NAMESPACES: &[&str] = &[
    "http://www.bohemiancoding.com/sketch/ns",
    "http://www.figma.com/figma/ns",
    "http://inkscape.sourceforge.net/DTD/sodipodi-0.dtd",
    "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd",
    "http://www.inkscape.org/namespaces/inkscape",
    "http://ns.adobe.com/AdobeIllustrator/10.0/",
    "http://ns.adobe.com/Graphs/1.0/",
    "http://ns.adobe.com/AdobeSVGViewerExtensions/3.0/",
    "http://ns.adobe.com/Variables/1.0/",
    "http://ns.adobe.com/SaveForWeb/1.0/",
    "http://ns.adobe.com/Extensibility/1.0/",
    "http://ns.adobe.com/Flows/1.0/",
    "http://ns.adobe.com/ImageReplacement/1.0/",
    "http://ns.adobe.com/GenericCustomNamespace/1.0/",
    "http://ns.adobe.com/XPath/1.0/",
    "http://schemas.microsoft.com/visio/2003/SVGExtensions/",
    "http://taptrix.com/vectorillustrator/svg_extensions",
    "http://www.serif.com/",
    "http://www.vector.evaxdesign.sk",
];

pub struct RemoveEditorsNsData;

impl Plugin for RemoveEditorsNsData {
    fn name(&self) -> &str {
        "removeEditorsNSData"
    }

    fn description(&self) -> &str {
        "removes editor namespaces, elements and attributes (Sketch, Inkscape, Illustrator...)"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({ "additionalNamespaces": [] })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let additional = str_list_param(params, "additionalNamespaces")?;
        let is_editor_ns =
            |uri: &str| EDITOR_NAMESPACES.contains(&uri) || additional.iter().any(|a| a == uri);

        let mut prefixes = HashSet::new();
        doc.walk(&mut |el| {
            for attr in &el.attributes {
                if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                    if is_editor_ns(&attr.value) {
                        prefixes.insert(prefix.to_string());
                    }
                }
            }
        });
        if prefixes.is_empty() {
            return Ok(());
        }

        let in_editor_ns = |name: &str| {
            name.split_once(':')
                .is_some_and(|(prefix, _)| prefix != "xmlns" && prefixes.contains(prefix))
        };

        doc.retain_nodes(|node| !matches!(node, Node::Element(el) if in_editor_ns(&el.name)));
        doc.walk_mut(&mut |el| {
            el.attributes.retain(|attr| {
                let declares_editor_ns = attr
                    .name
                    .strip_prefix("xmlns:")
                    .is_some_and(|prefix| prefixes.contains(prefix));
                !declares_editor_ns && !in_editor_ns(&attr.name)
            })
        });
        Ok(())
    }
}

pub struct RemoveUselessDefs;

impl Plugin for RemoveUselessDefs {
    fn name(&self) -> &str {
        "removeUselessDefs"
    }

    fn description(&self) -> &str {
        "removes elements in <defs> without id"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        fn referenceable(node: &Node) -> bool {
            match node {
                Node::Element(el) => {
                    el.has_attr("id")
                        || el.name == "style"
                        || el.children.iter().any(referenceable)
                }
                _ => false,
            }
        }

        doc.walk_mut(&mut |el| {
            if el.name == "defs" {
                el.children.retain(referenceable);
            }
        });
        Ok(())
    }
}

const CONDITIONAL_ATTRS: &[&str] = &["requiredFeatures", "requiredExtensions", "systemLanguage"];

pub struct RemoveEmptyAttrs;

impl Plugin for RemoveEmptyAttrs {
    fn name(&self) -> &str {
        "removeEmptyAttrs"
    }

    fn description(&self) -> &str {
        "removes attributes with empty values"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        doc.walk_mut(&mut |el| {
            el.attributes.retain(|attr| {
                !attr.value.trim().is_empty() || CONDITIONAL_ATTRS.contains(&attr.name.as_str())
            })
        });
        Ok(())
    }
}

const CONTAINERS: &[&str] = &[
    "a", "defs", "g", "glyph", "marker", "mask", "missing-glyph", "pattern", "switch", "symbol",
];

pub struct RemoveEmptyContainers;

impl Plugin for RemoveEmptyContainers {
    fn name(&self) -> &str {
        "removeEmptyContainers"
    }

    fn description(&self) -> &str {
        "removes empty container elements"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        fn removable(node: &Node) -> bool {
            match node {
                Node::Element(el) => {
                    CONTAINERS.contains(&el.name.as_str())
                        && el.children.is_empty()
                        && !(el.name == "pattern"
                            && (el.has_attr("href") || el.has_attr("xlink:href")))
                }
                _ => false,
            }
        }

        // Children first, so a group that only held empty groups goes too.
        fn prune(el: &mut Element) {
            for child in &mut el.children {
                if let Node::Element(child) = child {
                    prune(child);
                }
            }
            el.children.retain(|node| !removable(node));
        }

        if let Some(root) = doc.root_mut() {
            prune(root);
        }
        Ok(())
    }
}

pub struct RemoveDimensions;

impl Plugin for RemoveDimensions {
    fn name(&self) -> &str {
        "removeDimensions"
    }

    fn description(&self) -> &str {
        "removes width/height from the root and keeps a viewBox instead"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        let Some(root) = doc.root_mut() else {
            return Ok(());
        };

        if !root.has_attr("viewBox") {
            let parse = |v: Option<&str>| {
                v.and_then(|v| v.trim_end_matches("px").parse::<f64>().ok())
            };
            match (parse(root.attr("width")), parse(root.attr("height"))) {
                (Some(w), Some(h)) => root.set_attr("viewBox", format!("0 0 {w} {h}")),
                _ => return Ok(()),
            }
        }
        root.remove_attr("width");
        root.remove_attr("height");
        Ok(())
    }
}

pub struct RemoveAttrs;

impl Plugin for RemoveAttrs {
    fn name(&self) -> &str {
        "removeAttrs"
    }

    fn description(&self) -> &str {
        "removes attributes matching `attrs` patterns (`attr` or `element:attr`)"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({ "attrs": [], "elemSeparator": ":" })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let separator = str_param(params, "elemSeparator", ":")?;
        if separator.is_empty() {
            return Err(PluginError::invalid("elemSeparator", "must not be empty"));
        }

        let compile = |pattern: &str| {
            Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| PluginError::invalid("attrs", e.to_string()))
        };
        let rules = str_list_param(params, "attrs")?
            .iter()
            .map(|pattern| -> Result<(Regex, Regex), PluginError> {
                match pattern.split_once(separator) {
                    Some((elem, attr)) => Ok((compile(elem)?, compile(attr)?)),
                    None => Ok((compile(".*")?, compile(pattern)?)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if rules.is_empty() {
            return Ok(());
        }

        doc.walk_mut(&mut |el| {
            let matching: Vec<&Regex> = rules
                .iter()
                .filter(|(elem, _)| elem.is_match(&el.name))
                .map(|(_, attr)| attr)
                .collect();
            el.attributes
                .retain(|attr| !matching.iter().any(|re| re.is_match(&attr.name)));
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::test_support::run;
    use serde_json::json;

    #[test]
    fn test_prolog_and_comments() {
        let svg = r#"<?xml version="1.0"?><!DOCTYPE svg><!-- Generator: Sketch --><svg><!--! keep --><!-- drop --><path/></svg>"#;
        let out = run(&RemoveDoctype, svg, json!({}));
        let out = run(&RemoveXmlProcInst, &out, json!({}));
        let out = run(&RemoveComments, &out, json!({}));
        assert_eq!(out, "<svg><!--! keep --><path/></svg>");
    }

    #[test]
    fn test_remove_desc() {
        let svg = "<svg><desc>Created with Sketch.</desc><desc>Chart of sales</desc></svg>";
        assert_eq!(
            run(&RemoveDesc, svg, json!({})),
            "<svg><desc>Chart of sales</desc></svg>"
        );
        assert_eq!(run(&RemoveDesc, svg, json!({"removeAny": true})), "<svg/>");
    }

    #[test]
    fn test_remove_editors_ns_data() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:sketch="http://www.bohemiancoding.com/sketch/ns"><g sketch:type="MSPage" fill="none"><sketch:meta/></g></svg>"#;
        assert_eq!(
            run(&RemoveEditorsNsData, svg, json!({})),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g fill="none"/></svg>"#
        );
    }

    #[test]
    fn test_remove_useless_defs() {
        let svg = r#"<svg><defs><path d="M0"/><linearGradient id="a"/><g><circle id="b"/></g></defs></svg>"#;
        assert_eq!(
            run(&RemoveUselessDefs, svg, json!({})),
            r#"<svg><defs><linearGradient id="a"/><g><circle id="b"/></g></defs></svg>"#
        );
    }

    #[test]
    fn test_remove_empty_attrs_and_containers() {
        let svg = r#"<svg><g class=""><g><defs/></g></g><path d="M0" systemLanguage=""/></svg>"#;
        let out = run(&RemoveEmptyAttrs, svg, json!({}));
        assert_eq!(
            out,
            r#"<svg><g><g><defs/></g></g><path d="M0" systemLanguage=""/></svg>"#
        );
        assert_eq!(
            run(&RemoveEmptyContainers, &out, json!({})),
            r#"<svg><path d="M0" systemLanguage=""/></svg>"#
        );
    }

    #[test]
    fn test_remove_dimensions() {
        let with_viewbox = r#"<svg width="24" height="24" viewBox="0 0 24 24"/>"#;
        assert_eq!(
            run(&RemoveDimensions, with_viewbox, json!({})),
            r#"<svg viewBox="0 0 24 24"/>"#
        );

        let without = r#"<svg width="16px" height="8"/>"#;
        assert_eq!(run(&RemoveDimensions, without, json!({})), r#"<svg viewBox="0 0 16 8"/>"#);

        let relative = r#"<svg width="100%" height="8"/>"#;
        assert_eq!(run(&RemoveDimensions, relative, json!({})), relative);
    }

    #[test]
    fn test_remove_attrs_patterns() {
        let svg = r#"<svg fill="none"><path fill="red" stroke="blue" data-x="1"/></svg>"#;
        assert_eq!(
            run(&RemoveAttrs, svg, json!({"attrs": ["path:fill", "data-.*"]})),
            r#"<svg fill="none"><path stroke="blue"/></svg>"#
        );
    }

    #[test]
    fn test_remove_attrs_invalid_pattern() {
        let mut doc = Document::parse("<svg/>").unwrap();
        let params = params(json!({"attrs": ["("]}));
        assert!(RemoveAttrs.apply(&mut doc, &params).is_err());
    }
}
