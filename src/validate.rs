// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Result reference validation: a provider result must be an embedded
//! data URI of an accepted image kind or an absolute http(s) URL.

use url::Url;

/// Accepted embedded media kinds.
const ACCEPTED_DATA_PREFIXES: &[&str] = &[
    "data:image/png",
    "data:image/jpeg",
    "data:image/jpg",
    "data:image/webp",
    "data:image/gif",
];

/// True when `reference` is a usable result reference. Anything else —
/// empty strings, relative paths, unparseable addresses, schemes like
/// `javascript:` — is rejected and the attempt is treated as failed.
pub fn is_valid_result_reference(reference: &str) -> bool {
    if reference.is_empty() {
        return false;
    }
    if ACCEPTED_DATA_PREFIXES
        .iter()
        .any(|p| reference.starts_with(p))
    {
        return true;
    }
    match Url::parse(reference) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.has_host()
        }
        Err(_) => false,
    }
}
