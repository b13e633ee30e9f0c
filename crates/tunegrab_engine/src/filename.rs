use std::collections::HashMap;

use tunegrab_core::ItemDescriptor;

const MAX_STEM_CHARS: usize = 120;

/// Filesystem-safe form of a title, used as the output filename stem.
pub fn sanitize_title(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let mut cleaned: String = compacted
        .trim_matches(&['_', ' ', '.'][..])
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    if cleaned.is_empty() {
        cleaned = "untitled".to_string();
    }
    if is_reserved_windows_name(&cleaned) {
        cleaned.push('_');
    }
    cleaned
}

/// Picks one filename stem per entry, in input order.
///
/// Entries whose sanitized titles collide (ignoring case) with an entry of a
/// different id get ` [<id>]` appended, so two items never share a file.
pub fn assign_stems(entries: &[ItemDescriptor]) -> Vec<String> {
    let base: Vec<String> = entries.iter().map(|e| sanitize_title(&e.title)).collect();

    let mut ids_by_stem: HashMap<String, Vec<&str>> = HashMap::new();
    for (stem, entry) in base.iter().zip(entries) {
        let ids = ids_by_stem.entry(stem.to_lowercase()).or_default();
        if !ids.contains(&entry.id.as_str()) {
            ids.push(&entry.id);
        }
    }

    base.iter()
        .zip(entries)
        .map(|(stem, entry)| {
            let shared = ids_by_stem
                .get(&stem.to_lowercase())
                .is_some_and(|ids| ids.len() > 1);
            if shared {
                disambiguated_stem(stem, &entry.id)
            } else {
                stem.clone()
            }
        })
        .collect()
}

pub(crate) fn disambiguated_stem(stem: &str, id: &str) -> String {
    format!("{stem} [{}]", sanitize_title(id))
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
