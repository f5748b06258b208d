// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for upstream error classification

use fabstir_gen_gateway::providers::classify::classify_upstream;
use fabstir_gen_gateway::providers::ProviderError;

#[test]
fn test_moderation_message_is_content_filtered() {
    let err = classify_upstream(
        "dalle",
        Some(400),
        "Your request was rejected by our safety system",
    );
    assert!(matches!(err, ProviderError::ContentFiltered { .. }));
}

#[test]
fn test_nsfw_flag_is_content_filtered() {
    let err = classify_upstream("flux", Some(422), "prompt flagged as NSFW content");
    assert!(matches!(err, ProviderError::ContentFiltered { .. }));
}

#[test]
fn test_overload_statuses_are_transient() {
    for status in [408u16, 429, 500, 502, 503, 504] {
        let err = classify_upstream("sdxl", Some(status), "upstream error");
        assert!(
            matches!(err, ProviderError::Transient { .. }),
            "status {} should be transient",
            status
        );
    }
}

#[test]
fn test_loading_message_without_status_is_transient() {
    let err = classify_upstream("sdxl", None, "Model is currently loading, try again shortly");
    assert!(matches!(err, ProviderError::Transient { .. }));
}

#[test]
fn test_bad_credentials_are_fatal() {
    let err = classify_upstream("dalle", Some(401), "Incorrect API key provided");
    assert!(matches!(err, ProviderError::Fatal { .. }));
}

#[test]
fn test_malformed_request_is_fatal() {
    let err = classify_upstream("flux", Some(400), "unknown parameter: 'strenght'");
    assert!(matches!(err, ProviderError::Fatal { .. }));
}

#[test]
fn test_moderation_beats_transient_status() {
    // A 429 whose body is a moderation notice is still a filter rejection
    let err = classify_upstream("dalle", Some(429), "blocked by content policy");
    assert!(matches!(err, ProviderError::ContentFiltered { .. }));
}
