// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger matching.

use regex::{Regex, RegexBuilder};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use parley_core::types::RuleTrigger;

/// Flags applied when a regex trigger does not specify any.
const DEFAULT_REGEX_FLAGS: &str = "i";

/// Lowercase and strip combining diacritics, so "Canción" folds to "cancion".
pub fn fold_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// Whether any keyword occurs in `content`, ignoring case and accents.
pub fn keyword_matches(content: &str, keywords: &[String]) -> bool {
    let haystack = fold_text(content);
    keywords
        .iter()
        .map(|k| fold_text(k.trim()))
        .any(|k| !k.is_empty() && haystack.contains(&k))
}

/// Compile a pattern with JavaScript-style flags (`i`, `m`, `s`).
///
/// Flags without a counterpart (`g`, `u`, `y`) are ignored.
pub fn build_regex(pattern: &str, flags: Option<&str>) -> Result<Regex, regex::Error> {
    let flags = flags.unwrap_or(DEFAULT_REGEX_FLAGS);
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
}

/// Test a trigger against raw message content.
///
/// A pattern that fails to compile is logged and treated as no match.
pub fn trigger_matches(rule_id: &str, trigger: &RuleTrigger, content: &str) -> bool {
    match trigger {
        RuleTrigger::Keyword { keywords } => keyword_matches(content, keywords),
        RuleTrigger::Regex { pattern, flags } => match build_regex(pattern, flags.as_deref()) {
            Ok(re) => re.is_match(content),
            Err(e) => {
                warn!(rule_id, pattern = %pattern, error = %e, "invalid rule pattern, skipping");
                false
            }
        },
        RuleTrigger::Intent { .. } | RuleTrigger::Mood { .. } => false,
    }
}
