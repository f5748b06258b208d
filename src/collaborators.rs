// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External collaborator seams: session resolution, credit balance, job
//! persistence and notification emission. The gateway core talks to these
//! traits only; the in-memory implementations back tests and single-node
//! deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::admission::{PlanTier, Principal};

/// Resolved caller identity for one request.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub tier: PlanTier,
}

/// Maps request credentials (bearer token or client address) to a
/// principal and tier.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, bearer_token: Option<&str>, client_addr: &str) -> Session;
}

/// Static token table resolver. Unknown or absent tokens fall back to an
/// anonymous guest principal keyed by client address.
#[derive(Default)]
pub struct StaticSessionResolver {
    tokens: HashMap<String, (String, PlanTier)>,
}

impl StaticSessionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, user_id: &str, tier: PlanTier) -> Self {
        self.tokens
            .insert(token.to_string(), (user_id.to_string(), tier));
        self
    }
}

#[async_trait]
impl SessionResolver for StaticSessionResolver {
    async fn resolve(&self, bearer_token: Option<&str>, client_addr: &str) -> Session {
        if let Some((user_id, tier)) = bearer_token.and_then(|t| self.tokens.get(t)) {
            return Session {
                principal: Principal::User(user_id.clone()),
                tier: *tier,
            };
        }
        Session {
            principal: Principal::Anonymous(client_addr.to_string()),
            tier: PlanTier::Guest,
        }
    }
}

/// Credit balance for HD generations: affordability is a black-box boolean
/// here; the ledger arithmetic lives outside the gateway.
#[async_trait]
pub trait CreditService: Send + Sync {
    async fn can_afford_hd(&self, principal: &Principal) -> anyhow::Result<bool>;
    async fn debit_hd(&self, principal: &Principal) -> anyhow::Result<()>;
}

/// In-memory credit balances keyed by principal.
#[derive(Default)]
pub struct MemoryCreditService {
    balances: RwLock<HashMap<String, u64>>,
}

impl MemoryCreditService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, principal: &Principal, credits: u64) {
        self.balances.write().await.insert(principal.key(), credits);
    }
}

#[async_trait]
impl CreditService for MemoryCreditService {
    async fn can_afford_hd(&self, principal: &Principal) -> anyhow::Result<bool> {
        Ok(self
            .balances
            .read()
            .await
            .get(&principal.key())
            .copied()
            .unwrap_or(0)
            > 0)
    }

    async fn debit_hd(&self, principal: &Principal) -> anyhow::Result<()> {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(principal.key()).or_insert(0);
        *entry = entry.saturating_sub(1);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Opaque generation job record. The gateway creates one per admitted
/// request and updates it after dispatch; the schema beyond these fields
/// belongs to the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub principal: String,
    pub tool: String,
    pub mode: String,
    pub status: JobStatus,
    pub provider: Option<String>,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for the history listing.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub tool: Option<String>,
    pub status: Option<JobStatus>,
    pub mode: Option<String>,
}

#[derive(Debug)]
pub struct JobPage {
    pub items: Vec<JobRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, record: JobRecord) -> anyhow::Result<()>;
    async fn update(&self, record: JobRecord) -> anyhow::Result<()>;
    /// Newest-first page of a principal's jobs. `cursor` is the opaque
    /// value returned by a previous page.
    async fn list(
        &self,
        principal: &Principal,
        limit: usize,
        cursor: Option<&str>,
        filter: &JobFilter,
    ) -> anyhow::Result<JobPage>;
}

/// In-memory job store; newest jobs first, cursor is the job id to resume
/// after.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<Vec<JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: JobRecord) -> anyhow::Result<()> {
        self.jobs.write().await.push(record);
        Ok(())
    }

    async fn update(&self, record: JobRecord) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.iter_mut().find(|j| j.id == record.id) {
            *existing = record;
        }
        Ok(())
    }

    async fn list(
        &self,
        principal: &Principal,
        limit: usize,
        cursor: Option<&str>,
        filter: &JobFilter,
    ) -> anyhow::Result<JobPage> {
        let jobs = self.jobs.read().await;
        let key = principal.key();
        let mut matching: Vec<&JobRecord> = jobs
            .iter()
            .filter(|j| j.principal == key)
            .filter(|j| filter.tool.as_deref().map_or(true, |t| j.tool == t))
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.mode.as_deref().map_or(true, |m| j.mode == m))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let start = match cursor {
            Some(id) => matching
                .iter()
                .position(|j| j.id == id)
                .map(|p| p + 1)
                .unwrap_or(0),
            None => 0,
        };
        let page: Vec<JobRecord> = matching
            .iter()
            .skip(start)
            .take(limit)
            .map(|j| (*j).clone())
            .collect();
        let has_more = start + page.len() < matching.len();
        let next_cursor = if has_more {
            page.last().map(|j| j.id.clone())
        } else {
            None
        };
        Ok(JobPage {
            items: page,
            next_cursor,
            has_more,
        })
    }
}

/// Best-effort notification event. Emission runs off the request path and
/// failures are discarded.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    QuotaThreshold {
        principal: String,
        tier: String,
        used: u64,
        limit: u64,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: NotifyEvent) -> anyhow::Result<()>;
}

/// Logs events instead of delivering them.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, event: NotifyEvent) -> anyhow::Result<()> {
        info!("Notification: {:?}", event);
        Ok(())
    }
}
