use std::collections::HashSet;

use log::debug;

use crate::textutil::{char_len, contains_cjk, ends_with_terminal};

pub const DEFAULT_MERGE_MAX_CHARS: usize = 20;

#[derive(Clone, Copy, Debug)]
pub struct NormalizeOptions {
    /// Fragments shorter than this are appended to an unterminated previous paragraph.
    /// Zero disables merging.
    pub merge_max_chars: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            merge_max_chars: DEFAULT_MERGE_MAX_CHARS,
        }
    }
}

/// Single CJK characters can carry meaning; short Latin pieces rarely do.
pub fn meets_min_length(text: &str) -> bool {
    let len = char_len(text);
    if contains_cjk(text) {
        len >= 2
    } else {
        len >= 3
    }
}

fn should_merge(previous: &str, candidate: &str, opts: &NormalizeOptions) -> bool {
    char_len(candidate.trim()) < opts.merge_max_chars && !ends_with_terminal(previous)
}

fn normalize_pass(fragments: &[String], opts: &NormalizeOptions) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut paragraphs: Vec<String> = Vec::new();

    for fragment in fragments {
        if !seen.insert(fragment.as_str()) {
            continue;
        }
        let trimmed = fragment.trim();
        if trimmed.is_empty() || !meets_min_length(trimmed) {
            continue;
        }
        let merge = paragraphs
            .last()
            .is_some_and(|last| should_merge(last, fragment, opts));
        match paragraphs.last_mut() {
            Some(last) if merge => last.push_str(fragment),
            _ => paragraphs.push(fragment.clone()),
        }
    }

    paragraphs
        .into_iter()
        .map(|p| p.trim().to_string())
        .collect()
}

/// Turn the raw fragment pool into unique, non-blank paragraphs.
///
/// Passes repeat until the output is stable, so the result is a fixed point: feeding it
/// back in returns it unchanged and merging never leaves duplicates behind.
pub fn normalize_fragments(fragments: &[String], opts: &NormalizeOptions) -> Vec<String> {
    let mut current = normalize_pass(fragments, opts);
    for _ in 0..=current.len() {
        let next = normalize_pass(&current, opts);
        if next == current {
            break;
        }
        current = next;
    }
    debug!(
        "normalized {} fragments into {} paragraphs",
        fragments.len(),
        current.len()
    );
    current
}
