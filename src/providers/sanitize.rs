// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt sanitizer for the one-shot content-filter retry: strips terms
//! that commonly trip upstream moderation and appends a neutral
//! safety-affirming suffix.

/// Single words removed from the prompt before the sanitized retry.
const STRIPPED_TERMS: &[&str] = &[
    "nude",
    "naked",
    "nsfw",
    "explicit",
    "uncensored",
    "gore",
    "gory",
    "blood",
    "bloody",
    "pornographic",
    "erotic",
];

const SAFETY_SUFFIX: &str = "tasteful, safe for work, fully clothed";

fn is_stripped(word: &str) -> bool {
    let bare = word
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    STRIPPED_TERMS.contains(&bare.as_str())
}

/// Produce the sanitized variant of `prompt`: blocklisted words dropped
/// (case-insensitive, punctuation ignored), safety suffix appended. A
/// prompt reduced to nothing becomes the suffix alone.
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: Vec<&str> = prompt
        .split_whitespace()
        .filter(|w| !is_stripped(w))
        .collect();

    if kept.is_empty() {
        SAFETY_SUFFIX.to_string()
    } else {
        format!("{}, {}", kept.join(" "), SAFETY_SUFFIX)
    }
}
