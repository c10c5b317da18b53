//! Value passes - attribute whitespace, numeric precision, colors, path data

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::params;
use crate::document::Document;
use crate::plugins::{bool_param, usize_param, Params, Plugin, PluginError};

/// Precision is clamped to what an f64 can meaningfully carry.
const MAX_PRECISION: usize = 15;

static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());
static NUMERIC_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)(px|pt|pc|mm|cm|in|em|ex|%)?$").unwrap()
});
static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,]+").unwrap());
static RGB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgb\(\s*([\d.]+%?)\s*,\s*([\d.]+%?)\s*,\s*([\d.]+%?)\s*\)$").unwrap()
});
static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[MmZzLlHhVvCcSsQqTt]|[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").unwrap()
});

/// Round `value` to `precision` decimals and print it as short as possible.
pub(crate) fn format_number(value: f64, precision: usize, strip_leading_zero: bool) -> String {
    let precision = precision.min(MAX_PRECISION);
    let mut out = format!("{:.*}", precision, value);
    if out.contains('.') {
        out.truncate(out.trim_end_matches('0').trim_end_matches('.').len());
    }
    if out == "-0" {
        out = "0".to_string();
    }
    if strip_leading_zero {
        if let Some(rest) = out.strip_prefix("0.") {
            out = format!(".{rest}");
        } else if let Some(rest) = out.strip_prefix("-0.") {
            out = format!("-.{rest}");
        }
    }
    out
}

pub struct CleanupAttrs;

impl Plugin for CleanupAttrs {
    fn name(&self) -> &str {
        "cleanupAttrs"
    }

    fn description(&self) -> &str {
        "cleans up attributes from newlines, trailing and repeating spaces"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({ "newlines": true, "trim": true, "spaces": true })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let newlines = bool_param(params, "newlines", true)?;
        let trim = bool_param(params, "trim", true)?;
        let spaces = bool_param(params, "spaces", true)?;

        doc.walk_mut(&mut |el| {
            for attr in &mut el.attributes {
                if newlines && attr.value.contains('\n') {
                    attr.value = NEWLINES.replace_all(&attr.value, " ").into_owned();
                }
                if trim && attr.value.trim().len() != attr.value.len() {
                    attr.value = attr.value.trim().to_string();
                }
                if spaces && SPACES.is_match(&attr.value) {
                    attr.value = SPACES.replace_all(&attr.value, " ").into_owned();
                }
            }
        });
        Ok(())
    }
}

const NUMERIC_ATTRS: &[&str] = &[
    "x", "y", "x1", "y1", "x2", "y2", "cx", "cy", "r", "rx", "ry", "fx", "fy", "width",
    "height", "offset", "opacity", "fill-opacity", "stroke-opacity", "stop-opacity",
    "stroke-width", "stroke-miterlimit", "stroke-dashoffset", "font-size",
];

pub struct CleanupNumericValues;

impl Plugin for CleanupNumericValues {
    fn name(&self) -> &str {
        "cleanupNumericValues"
    }

    fn description(&self) -> &str {
        "rounds numeric values to the fixed precision, removes default 'px' units"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({
            "floatPrecision": 3,
            "leadingZero": true,
            "defaultPx": true
        })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let precision = usize_param(params, "floatPrecision", 3)?;
        let leading_zero = bool_param(params, "leadingZero", true)?;
        let default_px = bool_param(params, "defaultPx", true)?;

        let clean = |value: &str| -> Option<String> {
            let caps = NUMERIC_VALUE.captures(value.trim())?;
            let number: f64 = caps[1].parse().ok()?;
            let unit = match caps.get(2).map(|m| m.as_str()) {
                Some("px") if default_px => "",
                Some(unit) => unit,
                None => "",
            };
            Some(format!("{}{unit}", format_number(number, precision, leading_zero)))
        };

        doc.walk_mut(&mut |el| {
            for attr in &mut el.attributes {
                if attr.name == "viewBox" {
                    let parts: Option<Vec<String>> = LIST_SEPARATOR
                        .split(attr.value.trim())
                        .map(|part| {
                            part.parse::<f64>()
                                .ok()
                                .map(|n| format_number(n, precision, leading_zero))
                        })
                        .collect();
                    if let Some(parts) = parts {
                        attr.value = parts.join(" ");
                    }
                } else if NUMERIC_ATTRS.contains(&attr.name.as_str()) {
                    if let Some(cleaned) = clean(&attr.value) {
                        attr.value = cleaned;
                    }
                }
            }
        });
        Ok(())
    }
}

const COLOR_ATTRS: &[&str] = &[
    "fill", "stroke", "color", "stop-color", "flood-color", "lighting-color",
];

const COLOR_NAMES: &[(&str, &str)] = &[
    ("aqua", "#0ff"),
    ("azure", "#f0ffff"),
    ("beige", "#f5f5dc"),
    ("black", "#000"),
    ("blue", "#00f"),
    ("brown", "#a52a2a"),
    ("coral", "#ff7f50"),
    ("crimson", "#dc143c"),
    ("cyan", "#0ff"),
    ("darkblue", "#00008b"),
    ("darkgray", "#a9a9a9"),
    ("darkgreen", "#006400"),
    ("darkgrey", "#a9a9a9"),
    ("darkred", "#8b0000"),
    ("fuchsia", "#f0f"),
    ("gold", "#ffd700"),
    ("gray", "#808080"),
    ("green", "#008000"),
    ("grey", "#808080"),
    ("indigo", "#4b0082"),
    ("ivory", "#fffff0"),
    ("khaki", "#f0e68c"),
    ("lavender", "#e6e6fa"),
    ("lightblue", "#add8e6"),
    ("lightgray", "#d3d3d3"),
    ("lightgrey", "#d3d3d3"),
    ("lime", "#0f0"),
    ("magenta", "#f0f"),
    ("maroon", "#800000"),
    ("navy", "#000080"),
    ("olive", "#808000"),
    ("orange", "#ffa500"),
    ("orchid", "#da70d6"),
    ("pink", "#ffc0cb"),
    ("plum", "#dda0dd"),
    ("purple", "#800080"),
    ("red", "#f00"),
    ("salmon", "#fa8072"),
    ("silver", "#c0c0c0"),
    ("tan", "#d2b48c"),
    ("teal", "#008080"),
    ("tomato", "#ff6347"),
    ("turquoise", "#40e0d0"),
    ("violet", "#ee82ee"),
    ("wheat", "#f5deb3"),
    ("white", "#fff"),
    ("yellow", "#ff0"),
];

fn rgb_channel(raw: &str) -> Option<u8> {
    let value = match raw.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? * 2.55,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn shorten_hex(hex: &str) -> Option<String> {
    let digits = hex.strip_prefix('#')?.as_bytes();
    if digits.len() != 6 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    if digits[0] == digits[1] && digits[2] == digits[3] && digits[4] == digits[5] {
        Some(format!(
            "#{}{}{}",
            digits[0] as char, digits[2] as char, digits[4] as char
        ))
    } else {
        None
    }
}

pub struct ConvertColors;

impl Plugin for ConvertColors {
    fn name(&self) -> &str {
        "convertColors"
    }

    fn description(&self) -> &str {
        "converts colors: rgb() to #rrggbb, names to hex, #rrggbb to #rgb"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({
            "currentColor": false,
            "names2hex": true,
            "rgb2hex": true,
            "shorthex": true
        })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let current_color = bool_param(params, "currentColor", false)?;
        let names2hex = bool_param(params, "names2hex", true)?;
        let rgb2hex = bool_param(params, "rgb2hex", true)?;
        let shorthex = bool_param(params, "shorthex", true)?;

        let convert = |value: &str| -> String {
            let mut color = value.trim().to_string();

            if current_color && color != "none" && !color.starts_with("url(") {
                return "currentColor".to_string();
            }
            if names2hex {
                let lower = color.to_ascii_lowercase();
                if let Some((_, hex)) = COLOR_NAMES.iter().find(|(name, _)| *name == lower) {
                    color = hex.to_string();
                }
            }
            if rgb2hex {
                if let Some(caps) = RGB.captures(&color) {
                    let channels: Option<Vec<u8>> =
                        (1..=3).map(|i| rgb_channel(&caps[i])).collect();
                    if let Some(c) = channels {
                        color = format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2]);
                    }
                }
            }
            if color.starts_with('#') {
                color = color.to_ascii_lowercase();
                if shorthex {
                    if let Some(short) = shorten_hex(&color) {
                        color = short;
                    }
                }
            }
            color
        };

        doc.walk_mut(&mut |el| {
            for attr in &mut el.attributes {
                if COLOR_ATTRS.contains(&attr.name.as_str()) {
                    attr.value = convert(&attr.value);
                }
            }
        });
        Ok(())
    }
}

/// Tokenize path data into commands and numbers. `None` when the data holds
/// anything but tokens, separators and commas, or uses arcs: compact arc
/// flags (`a1 1 0 011 1`) cannot be split by a plain number scan.
fn tokenize_path(data: &str) -> Option<Vec<&str>> {
    if data.contains(['a', 'A']) {
        return None;
    }
    let mut tokens = vec![];
    let mut last_end = 0;
    for m in PATH_TOKEN.find_iter(data) {
        let gap = &data[last_end..m.start()];
        if !gap.chars().all(|c| c.is_whitespace() || c == ',') {
            return None;
        }
        tokens.push(m.as_str());
        last_end = m.end();
    }
    if !data[last_end..].chars().all(|c| c.is_whitespace() || c == ',') {
        return None;
    }
    Some(tokens)
}

fn minify_path(data: &str, precision: usize, leading_zero: bool) -> Option<String> {
    let tokens = tokenize_path(data)?;
    let mut out = String::with_capacity(data.len());
    let mut previous_number: Option<String> = None;

    for token in tokens {
        if token.starts_with(|c: char| c.is_ascii_alphabetic()) {
            out.push_str(token);
            previous_number = None;
            continue;
        }
        let number = format_number(token.parse::<f64>().ok()?, precision, leading_zero);
        if let Some(prev) = &previous_number {
            let joins = number.starts_with('-') || (number.starts_with('.') && prev.contains('.'));
            if !joins {
                out.push(' ');
            }
        }
        out.push_str(&number);
        previous_number = Some(number);
    }
    Some(out)
}

pub struct ConvertPathData;

impl Plugin for ConvertPathData {
    fn name(&self) -> &str {
        "convertPathData"
    }

    fn description(&self) -> &str {
        "rounds path data coordinates and drops redundant separators"
    }

    fn default_params(&self) -> Option<Params> {
        Some(params(json!({ "floatPrecision": 3, "leadingZero": true })))
    }

    fn apply(&self, doc: &mut Document, params: &Params) -> Result<(), PluginError> {
        let precision = usize_param(params, "floatPrecision", 3)?;
        let leading_zero = bool_param(params, "leadingZero", true)?;

        doc.walk_mut(&mut |el| {
            if el.name != "path" && el.name != "glyph" && el.name != "missing-glyph" {
                return;
            }
            for attr in &mut el.attributes {
                if attr.name == "d" {
                    if let Some(minified) = minify_path(&attr.value, precision, leading_zero) {
                        attr.value = minified;
                    }
                }
            }
        });
        Ok(())
    }
}
