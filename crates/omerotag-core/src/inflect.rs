//! English noun inflection for collection names.
//!
//! Only one transformation step is ever applied: `plural("image")` is `"images"`,
//! `singular("images")` is `Some("image")`, and `singular("image")` is `None`.

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("datum", "data"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
];

/// Same in both forms.
const INVARIANT: &[&str] = &["series", "species", "metadata", "info"];

const SIBILANT: &[&str] = &["s", "x", "z", "ch", "sh"];

/// Plural of a singular noun.
pub fn plural(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if INVARIANT.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, many)) = IRREGULAR.iter().find(|(one, _)| *one == lower) {
        return match_case(word, many);
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !ends_with_vowel(stem) && !stem.is_empty() {
            return format!("{}ies", stem);
        }
    }
    if SIBILANT.iter().any(|s| lower.ends_with(s)) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

/// Singular of a plural noun, or `None` when `word` is not recognisably plural.
pub fn singular(word: &str) -> Option<String> {
    let lower = word.to_ascii_lowercase();
    if INVARIANT.contains(&lower.as_str()) {
        return None;
    }
    if let Some((one, _)) = IRREGULAR.iter().find(|(_, many)| *many == lower) {
        return Some(match_case(word, one));
    }
    if IRREGULAR.iter().any(|(one, _)| *one == lower) {
        return None;
    }
    if lower.len() > 3 && lower.ends_with("ies") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes", "uses"] {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    let singular_endings = ["ss", "us", "sis", "xis"];
    if lower.len() > 1 && lower.ends_with('s') && !singular_endings.iter().any(|e| lower.ends_with(e)) {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

fn ends_with_vowel(s: &str) -> bool {
    s.chars()
        .last()
        .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
}

fn match_case(word: &str, replacement: &str) -> String {
    if word.chars().next().is_some_and(|c| c.is_uppercase()) {
        capitalize(replacement)
    } else {
        replacement.to_string()
    }
}

/// Uppercase the first character, leave the rest alone.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
