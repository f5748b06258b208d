// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for result reference validation

use fabstir_gen_gateway::is_valid_result_reference;

#[test]
fn test_accepts_well_formed_references() {
    assert!(is_valid_result_reference(
        "https://cdn.example.com/generations/abc123.png"
    ));
    assert!(is_valid_result_reference(
        "data:image/png;base64,iVBORw0KGgoAAAANSUhEUg=="
    ));
}

#[test]
fn test_rejects_empty_string() {
    assert!(!is_valid_result_reference(""));
}

#[test]
fn test_rejects_malformed_address() {
    assert!(!is_valid_result_reference("htp:/broken"));
    assert!(!is_valid_result_reference("cdn.example.com/no-scheme.png"));
}

#[test]
fn test_rejects_javascript_scheme() {
    assert!(!is_valid_result_reference("javascript:alert(document.cookie)"));
}
