// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Usage-policy admission control for generation requests

pub mod controller;
pub mod tiers;

pub use controller::{AdmissionController, AdmissionDecision, ConcurrencyGuard};
pub use tiers::{PlanTier, Principal};
