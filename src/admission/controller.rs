// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Admission gates: per-minute rate limit, per-principal concurrency cap,
//! per-day standard quota. All counters live in the shared counter store
//! so limits hold across gateway instances.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::tiers::{PlanTier, Principal};
use crate::collaborators::{Notifier, NotifyEvent};
use crate::counters::CounterStore;

const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Stale-claim guard: an in-flight slot that is never released expires on
/// its own after this long.
const CONCURRENCY_WINDOW: Duration = Duration::from_secs(600);
/// Day buckets outlive the day they cover so a closed day stays readable.
const QUOTA_WINDOW: Duration = Duration::from_secs(48 * 3600);

/// Outcome of the admission gates. Rejections carry the structured retry
/// data the HTTP layer surfaces to callers.
#[derive(Debug)]
pub enum AdmissionDecision {
    Allowed,
    RateLimited {
        retry_after_secs: u64,
        limit: u64,
        used: u64,
    },
    QuotaExceeded {
        retry_after_secs: u64,
        limit: u64,
        used: u64,
    },
    ConcurrencyExceeded {
        retry_after_secs: u64,
        limit: u64,
    },
    InsufficientBalance,
}

/// One claimed in-flight slot. Must be released exactly once on every exit
/// path; the drop hook is a backstop for panics, not the release path.
pub struct ConcurrencyGuard {
    store: Arc<dyn CounterStore>,
    key: String,
    released: AtomicBool,
}

impl ConcurrencyGuard {
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.store.decr(&self.key).await {
            warn!("Failed to release concurrency slot {}: {}", self.key, e);
        }
    }
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            // Outside a runtime there is nothing to spawn on; the slot is
            // left to its window expiry instead.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let store = self.store.clone();
                let key = std::mem::take(&mut self.key);
                handle.spawn(async move {
                    let _ = store.decr(&key).await;
                });
            }
        }
    }
}

pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
    notifier: Arc<dyn Notifier>,
    rate_window: Duration,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn CounterStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            rate_window: RATE_WINDOW,
        }
    }

    /// Custom rate window for tests.
    pub fn with_rate_window(
        store: Arc<dyn CounterStore>,
        notifier: Arc<dyn Notifier>,
        rate_window: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            rate_window,
        }
    }

    /// Run the admission gates in order: rate limit, concurrency claim,
    /// then daily quota. Gates short-circuit; the concurrency slot claimed
    /// before the quota gate is released here on quota rejection so no
    /// claim leaks on any synchronous path.
    ///
    /// On `Allowed`, the returned guard holds the claimed slot and the
    /// caller releases it when the generation finishes.
    pub async fn admit(
        &self,
        principal: &Principal,
        tier: PlanTier,
        hd_affordable: Option<bool>,
    ) -> anyhow::Result<(AdmissionDecision, Option<ConcurrencyGuard>)> {
        if let Some(decision) = self.check_rate_limit(principal, tier).await? {
            return Ok((decision, None));
        }

        let (guard, rejection) = self.claim_concurrency(principal, tier).await?;
        if let Some(decision) = rejection {
            return Ok((decision, None));
        }
        let guard = match guard {
            Some(g) => g,
            None => anyhow::bail!("concurrency claim returned neither guard nor rejection"),
        };

        match hd_affordable {
            // HD generations draw on the external credit balance, not the
            // daily quota.
            Some(true) => Ok((AdmissionDecision::Allowed, Some(guard))),
            Some(false) => {
                guard.release().await;
                Ok((AdmissionDecision::InsufficientBalance, None))
            }
            None => {
                if let Some(decision) = self.claim_quota(principal, tier).await? {
                    guard.release().await;
                    return Ok((decision, None));
                }
                Ok((AdmissionDecision::Allowed, Some(guard)))
            }
        }
    }

    /// Rolling-window rate check, claimed the same way as quota: increment
    /// the window counter, compare, decrement back on rejection. Two
    /// concurrent requests at the last remaining slot observe distinct
    /// counts, and a rejected request consumes nothing.
    pub async fn check_rate_limit(
        &self,
        principal: &Principal,
        tier: PlanTier,
    ) -> anyhow::Result<Option<AdmissionDecision>> {
        let key = format!("rl:{}", principal.key());
        let limit = tier.requests_per_minute();
        let count = self.store.incr_with_window(&key, self.rate_window).await?;
        if count > limit {
            self.store.decr(&key).await?;
            let retry_after = self
                .store
                .ttl(&key)
                .await?
                .unwrap_or(self.rate_window)
                .as_secs()
                .max(1);
            debug!("Rate limited: {} used={} limit={}", principal, limit, limit);
            return Ok(Some(AdmissionDecision::RateLimited {
                retry_after_secs: retry_after,
                limit,
                used: limit,
            }));
        }
        Ok(None)
    }

    /// Claim an in-flight slot. An over-cap claim is decremented straight
    /// back so rejection leaves the counter where it started.
    pub async fn claim_concurrency(
        &self,
        principal: &Principal,
        tier: PlanTier,
    ) -> anyhow::Result<(Option<ConcurrencyGuard>, Option<AdmissionDecision>)> {
        let key = format!("inflight:{}", principal.key());
        let limit = tier.max_concurrent();
        let count = self
            .store
            .incr_with_window(&key, CONCURRENCY_WINDOW)
            .await?;
        if count > limit {
            self.store.decr(&key).await?;
            debug!(
                "Concurrency exceeded: {} inflight={} limit={}",
                principal, count, limit
            );
            return Ok((
                None,
                Some(AdmissionDecision::ConcurrencyExceeded {
                    retry_after_secs: 30,
                    limit,
                }),
            ));
        }
        Ok((
            Some(ConcurrencyGuard {
                store: self.store.clone(),
                key,
                released: AtomicBool::new(false),
            }),
            None,
        ))
    }

    /// Atomic daily-quota claim: increment the day bucket, then reject and
    /// decrement back when the result overshoots the limit. Two concurrent
    /// claims at the last remaining unit observe distinct counts, so only
    /// one passes.
    pub async fn claim_quota(
        &self,
        principal: &Principal,
        tier: PlanTier,
    ) -> anyhow::Result<Option<AdmissionDecision>> {
        let limit = tier.daily_standard_limit();
        if limit == 0 {
            // Unlimited tier: nothing is consumed or counted
            return Ok(None);
        }
        let key = quota_key(principal);
        let count = self.store.incr_with_window(&key, QUOTA_WINDOW).await?;
        if count > limit {
            self.store.decr(&key).await?;
            debug!("Quota exceeded: {} used={} limit={}", principal, limit, limit);
            return Ok(Some(AdmissionDecision::QuotaExceeded {
                retry_after_secs: seconds_until_utc_midnight(),
                limit,
                used: limit,
            }));
        }
        self.maybe_notify_quota(principal, tier, count, limit);
        Ok(None)
    }

    /// Daily standard-quota usage for this principal (reporting only).
    pub async fn quota_used(&self, principal: &Principal) -> anyhow::Result<u64> {
        Ok(self.store.get(&quota_key(principal)).await?)
    }

    /// One-shot 80% warning, emitted the moment the counter crosses the
    /// threshold. Detached task; emission failures never touch the request.
    fn maybe_notify_quota(&self, principal: &Principal, tier: PlanTier, used: u64, limit: u64) {
        let threshold = (limit as f64 * 0.8).ceil() as u64;
        if used != threshold {
            return;
        }
        let notifier = self.notifier.clone();
        let event = NotifyEvent::QuotaThreshold {
            principal: principal.key(),
            tier: tier.as_str().to_string(),
            used,
            limit,
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.emit(event).await {
                debug!("Quota notification dropped: {}", e);
            }
        });
    }
}

fn quota_key(principal: &Principal) -> String {
    let day = Utc::now().format("%Y%m%d");
    format!("quota:{}:{}", principal.key(), day)
}

/// Seconds until the daily quota boundary (UTC midnight).
fn seconds_until_utc_midnight() -> u64 {
    let now = Utc::now();
    let tomorrow = (now + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);
    (tomorrow - now).num_seconds().max(1) as u64
}
