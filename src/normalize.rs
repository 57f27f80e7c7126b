use std::collections::HashSet;

use crate::config::NormalizeConfig;

#[derive(Debug, Clone)]
pub struct DisciplineNormalizer {
    case_insensitive: bool,
    strip_prefixes: Vec<String>,
}

impl DisciplineNormalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        Self {
            case_insensitive: config.case_insensitive,
            strip_prefixes: config.strip_prefixes.clone(),
        }
    }

    /// The name as shown to readers: trimmed, boilerplate prefix removed, case kept.
    pub fn display<'a>(&self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim();
        for prefix in &self.strip_prefixes {
            if let Some(rest) = strip_prefix_ignore_case(trimmed, prefix) {
                return rest.trim();
            }
        }
        trimmed
    }

    /// The lookup key for a discipline name.
    pub fn key(&self, raw: &str) -> String {
        let collapsed = self
            .display(raw)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if self.case_insensitive {
            collapsed.to_lowercase()
        } else {
            collapsed
        }
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let mut chars = value.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let offset = chars.next().map(|(index, _)| index).unwrap_or(value.len());
    Some(&value[offset..])
}

/// Drops repeated lines, comparing trimmed content case-sensitively. Kept lines retain
/// their original formatting and terminators; blank lines are never dropped.
pub fn dedup_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    let mut output: String = text
        .split_inclusive('\n')
        .filter(|line| {
            let content = line.trim();
            content.is_empty() || seen.insert(content.to_string())
        })
        .collect();

    // A dropped final line must not leave the previous line's terminator dangling.
    if !text.ends_with('\n') && output.ends_with('\n') {
        output.pop();
        if output.ends_with('\r') {
            output.pop();
        }
    }
    output
}

/// Upper-cases the first character and leaves the rest untouched.
pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
