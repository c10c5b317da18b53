//! Naming - Identifiers derived from export file names

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// File name without directory and extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Component identifier for an exported file: every word starts uppercase
/// and everything that is not a letter or digit is dropped.
///
/// `my_icon-01.svg` becomes `MyIcon01`. Names that would start with a digit
/// are prefixed with `Svg` so they stay valid identifiers.
pub fn component_name(path: &Path) -> String {
    let base = base_name(path);
    let mut name: String = WORD
        .find_iter(&base)
        .map(|word| capitalize(word.as_str()))
        .collect();

    if name.chars().next().map_or(true, |c| c.is_numeric()) {
        name.insert_str(0, "Svg");
    }
    name
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Per-file ID prefix for `cleanupIDs`: `Icon Name.svg` becomes `icon-name-`.
pub fn id_prefix(path: &Path) -> String {
    let base = base_name(path);
    let mut prefix = WHITESPACE.replace_all(&base, "-").to_lowercase();
    prefix.push('-');
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_word_boundaries() {
        assert_eq!(component_name(Path::new("my_icon-01.svg")), "MyIcon01");
        assert_eq!(component_name(Path::new("/exports/Icon Name.svg")), "IconName");
        assert_eq!(component_name(Path::new("arrow left.svg")), "ArrowLeft");
        assert_eq!(component_name(Path::new("chevronDown.svg")), "ChevronDown");
    }

    #[test]
    fn test_component_name_leading_digit() {
        assert_eq!(component_name(Path::new("24px-close.svg")), "Svg24pxClose");
        assert_eq!(component_name(Path::new("---.svg")), "Svg");
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix(Path::new("Icon Name.svg")), "icon-name-");
        assert_eq!(id_prefix(Path::new("/a/b/Big   Arrow\tUp.svg")), "big-arrow-up-");
        assert_eq!(id_prefix(Path::new("logo.svg")), "logo-");
    }
}
