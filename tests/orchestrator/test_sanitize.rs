// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the prompt sanitizer

use fabstir_gen_gateway::providers::sanitize_prompt;

#[test]
fn test_strips_blocked_terms() {
    let out = sanitize_prompt("a nude portrait, dramatic lighting");
    assert!(!out.to_lowercase().contains("nude"));
    assert!(out.contains("portrait"));
    assert!(out.contains("dramatic lighting"));
}

#[test]
fn test_appends_safety_suffix() {
    let out = sanitize_prompt("a castle on a hill");
    assert!(out.starts_with("a castle on a hill"));
    assert!(out.ends_with("tasteful, safe for work, fully clothed"));
}

#[test]
fn test_stripping_is_case_insensitive() {
    let out = sanitize_prompt("NSFW Explicit scene at the beach");
    let lower = out.to_lowercase();
    assert!(!lower.contains("nsfw"));
    // "explicit" is stripped; the suffix re-affirms safe content
    assert!(lower.contains("scene at the beach"));
}

#[test]
fn test_punctuation_does_not_shield_terms() {
    let out = sanitize_prompt("gore, blood, and a quiet meadow");
    let lower = out.to_lowercase();
    assert!(!lower.contains("gore"));
    assert!(!lower.contains("blood"));
    assert!(lower.contains("quiet meadow"));
}

#[test]
fn test_fully_stripped_prompt_becomes_suffix() {
    let out = sanitize_prompt("nude naked explicit");
    assert_eq!(out, "tasteful, safe for work, fully clothed");
}
