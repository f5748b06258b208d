// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Plan tiers and the principal identity used for policy counters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a request is metered against: an authenticated user id or the
/// anonymous client address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    User(String),
    Anonymous(String),
}

impl Principal {
    /// Stable counter-store key for this principal.
    pub fn key(&self) -> String {
        match self {
            Principal::User(id) => format!("user:{}", id),
            Principal::Anonymous(addr) => format!("ip:{}", addr),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous(_))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Policy bucket for a principal. Ordered by generosity: guest is always
/// the most restrictive on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Guest,
    Free,
    Plus,
    Pro,
}

impl PlanTier {
    /// Requests allowed per rolling 60-second window.
    pub fn requests_per_minute(&self) -> u64 {
        match self {
            PlanTier::Guest => 2,
            PlanTier::Free => 5,
            PlanTier::Plus => 15,
            PlanTier::Pro => 30,
        }
    }

    /// Standard-quality generations allowed per UTC day; 0 = unlimited.
    pub fn daily_standard_limit(&self) -> u64 {
        match self {
            PlanTier::Guest => 10,
            PlanTier::Free => 30,
            PlanTier::Plus => 200,
            PlanTier::Pro => 0,
        }
    }

    /// In-flight generations allowed at once.
    pub fn max_concurrent(&self) -> u64 {
        match self {
            PlanTier::Guest => 1,
            PlanTier::Free => 1,
            PlanTier::Plus => 2,
            PlanTier::Pro => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Guest => "guest",
            PlanTier::Free => "free",
            PlanTier::Plus => "plus",
            PlanTier::Pro => "pro",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
