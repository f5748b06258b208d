// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider registry: a fixed-priority list of adapters. Priority order is
//! static configuration, not dynamic scoring, so fallback behavior is
//! deterministic and debuggable.

use std::sync::Arc;

use super::adapter::ImageProvider;

/// Whether the gateway runs against its own provider keys or the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Service-owned credentials; fallback across providers is allowed.
    Hosted,
    /// Caller-supplied credentials; fallback would silently spend the
    /// service's own keys, so the chain is the primary alone.
    SelfHosted,
}

pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ImageProvider>>,
}

impl ProviderRegistry {
    /// Build from a priority-ordered adapter list (index 0 = default
    /// primary and first fallback choice).
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Providers in fixed priority order.
    pub fn priority(&self) -> &[Arc<dyn ImageProvider>] {
        &self.providers
    }

    /// Default primary: the highest-priority provider with a credential.
    pub fn default_primary(&self) -> Option<Arc<dyn ImageProvider>> {
        self.providers.iter().find(|p| p.has_credential()).cloned()
    }
}
