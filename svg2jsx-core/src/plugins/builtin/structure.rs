//! Structure passes - group collapsing and attribute ordering

use serde_json::json;

use super::params;
use crate::document::{Document, Element, Node};
use crate::plugins::{str_list_param, Params, Plugin, PluginError};

/// Group attributes that cannot be pushed down onto a single child.
const PINNED_GROUP_ATTRS: &[&str] = &["id", "class", "style", "clip-path", "mask", "filter"];

fn can_hoist(group: &Element) -> bool {
    match group.children.as_slice() {
        [Node::Element(child)] => !group.attributes.iter().any(|attr| {
            PINNED_GROUP_ATTRS.contains(&attr.name.as_str())
                || (attr.name != "transform" && child.has_attr(&attr.name))
        }),
        _ => false,
    }
}

fn collapse(el: &mut Element) {
    for child in &mut el.children {
        if let Node::Element(child) = child {
            collapse(child);
        }
    }

    let children = std::mem::take(&mut el.children);
    for node in children {
        match node {
            Node::Element(mut group) if group.name == "g" => {
                if group.attributes.is_empty() {
                    el.children.append(&mut group.children);
                } else if can_hoist(&group) {
                    if let Some(Node::Element(mut child)) = group.children.pop() {
                        for attr in group.attributes {
                            if attr.name == "transform" {
                                let combined = match child.attr("transform") {
                                    Some(own) => format!("{} {own}", attr.value),
                                    None => attr.value,
                                };
                                child.set_attr("transform", combined);
                            } else {
                                child.set_attr(attr.name, attr.value);
                            }
                        }
                        el.children.push(Node::Element(child));
                    }
                } else {
                    el.children.push(Node::Element(group));
                }
            }
            other => el.children.push(other),
        }
    }
}

pub struct CollapseGroups;

impl Plugin for CollapseGroups {
    fn name(&self) -> &str {
        "collapseGroups"
    }

    fn description(&self) -> &str {
        "collapses useless groups"
    }

    fn apply(&self, doc: &mut Document, _params: &Params) -> Result<(), PluginError> {
        if let Some(root) = doc.root_mut() {
            collapse(root);
        }
        Ok(())
    }
}

pub struct SortAttrs;

impl Plugin for SortAttrs {
    fn name(&self) -> &str {
        "sortAttrs"
    }

    fn description(&self) -> &str {
        "sorts element attributes for better gzip compression"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({
            "order": [
                "id", "width", "height", "x", "x1", "x2", "y", "y1", "y2",
                "cx", "cy", "r", "fill", "stroke", "marker", "d", "points"
            ]
        })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let order = str_list_param(params, "order")?;

        // (group, position in `order`); ties fall back to the name.
        let rank = |name: &str| -> (u8, usize) {
            if name == "xmlns" {
                return (0, 0);
            }
            if name.starts_with("xmlns:") {
                return (1, 0);
            }
            let stem = name.split('-').next().unwrap_or(name);
            match order.iter().position(|o| o == name || o == stem) {
                Some(pos) => (2, pos),
                None => (3, 0),
            }
        };

        doc.walk_mut(&mut |el| {
            el.attributes.sort_by(|a, b| {
                rank(&a.name)
                    .cmp(&rank(&b.name))
                    .then_with(|| a.name.cmp(&b.name))
            });
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::test_support::run;

    #[test]
    fn test_collapse_plain_groups() {
        let svg = r#"<svg><g><g><path d="M0"/></g><circle r="1"/></g></svg>"#;
        assert_eq!(
            run(&CollapseGroups, svg, json!({})),
            r#"<svg><path d="M0"/><circle r="1"/></svg>"#
        );
    }

    #[test]
    fn test_hoist_attributes_onto_single_child() {
        let svg = r#"<svg><g fill="red" transform="translate(1)"><path d="M0" transform="scale(2)"/></g></svg>"#;
        assert_eq!(
            run(&CollapseGroups, svg, json!({})),
            r#"<svg><path d="M0" transform="translate(1) scale(2)" fill="red"/></svg>"#
        );
    }

    #[test]
    fn test_keep_groups_that_cannot_collapse() {
        let pinned = r#"<svg><g id="layer"><path d="M0"/></g></svg>"#;
        assert_eq!(run(&CollapseGroups, pinned, json!({})), pinned);

        let conflict = r#"<svg><g fill="red"><path fill="blue"/></g></svg>"#;
        assert_eq!(run(&CollapseGroups, conflict, json!({})), conflict);
    }

    #[test]
    fn test_sort_attrs() {
        let svg = r#"<svg viewBox="0 0 1 1" xmlns:xlink="x" xmlns="y"><path d="M0" stroke-width="2" fill="red" id="a" aria-hidden="true"/></svg>"#;
        assert_eq!(
            run(&SortAttrs, svg, json!({})),
            r#"<svg xmlns="y" xmlns:xlink="x" viewBox="0 0 1 1"><path id="a" fill="red" stroke-width="2" d="M0" aria-hidden="true"/></svg>"#
        );
    }
}
