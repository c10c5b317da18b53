//! cleanupIDs - removes unused IDs and minifies/prefixes referenced ones
//!
//! The `prefix` param is what keeps IDs unique once several optimized icons
//! end up inlined on the same page; the executor derives it per file.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::json;
use std::collections::{HashMap, HashSet};

use super::params;
use crate::document::{Document, Element};
use crate::plugins::{bool_param, str_list_param, str_param, Params, Plugin, PluginError};

static URL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?#([^'")\s]+)['"]?\s*\)"#).unwrap());

const ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Short name for the `n`th ID: a..z, A..Z, aa, ab, ...
fn generate_id(mut n: usize) -> String {
    let base = ID_CHARS.len();
    let mut out = vec![];
    loop {
        out.push(ID_CHARS[n % base]);
        if n < base {
            break;
        }
        n = n / base - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn is_href(name: &str) -> bool {
    name == "href" || name.ends_with(":href")
}

fn references(el: &Element, found: &mut HashSet<String>) {
    for attr in &el.attributes {
        for caps in URL_REF.captures_iter(&attr.value) {
            found.insert(caps[1].to_string());
        }
        if is_href(&attr.name) {
            if let Some(id) = attr.value.strip_prefix('#') {
                found.insert(id.to_string());
            }
        }
    }
}

pub struct CleanupIds;

impl Plugin for CleanupIds {
    fn name(&self) -> &str {
        "cleanupIDs"
    }

    fn description(&self) -> &str {
        "removes unused IDs and minifies used ones"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({
            "remove": true,
            "minify": true,
            "prefix": "",
            "preserve": [],
            "preservePrefixes": [],
            "force": false
        })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let remove = bool_param(params, "remove", true)?;
        let minify = bool_param(params, "minify", true)?;
        let prefix = str_param(params, "prefix", "")?;
        let preserve: HashSet<String> = str_list_param(params, "preserve")?.into_iter().collect();
        let preserve_prefixes = str_list_param(params, "preservePrefixes")?;
        let force = bool_param(params, "force", false)?;

        let mut ids = vec![];
        let mut referenced = HashSet::new();
        let mut scripted = false;
        doc.walk(&mut |el| {
            if el.name == "style" || el.name == "script" {
                scripted = true;
            }
            if let Some(id) = el.attr("id") {
                ids.push(id.to_string());
            }
            references(el, &mut referenced);
        });

        // IDs may be used from CSS or scripts we do not parse.
        if scripted && !force {
            return Ok(());
        }

        let is_preserved = |id: &str| {
            preserve.contains(id) || preserve_prefixes.iter().any(|p| id.starts_with(p.as_str()))
        };

        let mut renames: HashMap<String, String> = HashMap::new();
        let mut counter = 0;
        for id in &ids {
            if renames.contains_key(id) || is_preserved(id) || !referenced.contains(id) {
                continue;
            }
            let renamed = if minify {
                loop {
                    let candidate = format!("{prefix}{}", generate_id(counter));
                    counter += 1;
                    if !preserve.contains(&candidate) {
                        break candidate;
                    }
                }
            } else if id.starts_with(prefix) {
                id.clone()
            } else {
                format!("{prefix}{id}")
            };
            renames.insert(id.clone(), renamed);
        }

        doc.walk_mut(&mut |el| {
            if let Some(id) = el.attr("id").map(str::to_string) {
                if let Some(renamed) = renames.get(&id) {
                    el.set_attr("id", renamed.as_str());
                } else if remove && !referenced.contains(&id) && !is_preserved(&id) {
                    el.remove_attr("id");
                }
            }

            for attr in &mut el.attributes {
                if attr.value.contains("url(") {
                    let rewritten = URL_REF.replace_all(&attr.value, |caps: &Captures| {
                        match renames.get(&caps[1]) {
                            Some(renamed) => format!("url(#{renamed})"),
                            None => caps[0].to_string(),
                        }
                    });
                    attr.value = rewritten.into_owned();
                }
                if is_href(&attr.name) {
                    let renamed = attr
                        .value
                        .strip_prefix('#')
                        .and_then(|id| renames.get(id));
                    if let Some(renamed) = renamed {
                        attr.value = format!("#{renamed}");
                    }
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin::test_support::run;

    const GRADIENT: &str = r##"<svg><defs><linearGradient id="gradient-1"/><path id="path-2"/></defs><rect id="unused" fill="url(#gradient-1)"/><use xlink:href="#path-2"/></svg>"##;

    #[test]
    fn test_generate_id_sequence() {
        assert_eq!(generate_id(0), "a");
        assert_eq!(generate_id(25), "z");
        assert_eq!(generate_id(26), "A");
        assert_eq!(generate_id(51), "Z");
        assert_eq!(generate_id(52), "aa");
        assert_eq!(generate_id(53), "ab");
    }

    #[test]
    fn test_minify_and_remove_unused() {
        assert_eq!(
            run(&CleanupIds, GRADIENT, json!({})),
            r##"<svg><defs><linearGradient id="a"/><path id="b"/></defs><rect fill="url(#a)"/><use xlink:href="#b"/></svg>"##
        );
    }

    #[test]
    fn test_prefix_is_stable_across_passes() {
        let once = run(&CleanupIds, GRADIENT, json!({"prefix": "icon-name-"}));
        assert_eq!(
            once,
            r##"<svg><defs><linearGradient id="icon-name-a"/><path id="icon-name-b"/></defs><rect fill="url(#icon-name-a)"/><use xlink:href="#icon-name-b"/></svg>"##
        );
        let twice = run(&CleanupIds, &once, json!({"prefix": "icon-name-"}));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prefix_without_minify() {
        let params = json!({"prefix": "logo-", "minify": false});
        let once = run(&CleanupIds, GRADIENT, params.clone());
        assert!(once.contains(r#"id="logo-gradient-1""#));
        assert!(once.contains("url(#logo-gradient-1)"));
        assert_eq!(run(&CleanupIds, &once, params), once);
    }

    #[test]
    fn test_preserve_and_style_guard() {
        let out = run(&CleanupIds, GRADIENT, json!({"preserve": ["unused", "path-2"]}));
        assert!(out.contains(r#"id="unused""#));
        assert!(out.contains(r##"xlink:href="#path-2""##));

        let styled = r#"<svg><style>#x{fill:red}</style><g id="x"/></svg>"#;
        assert_eq!(run(&CleanupIds, styled, json!({})), styled);
    }
}
