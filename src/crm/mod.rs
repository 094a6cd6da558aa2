//! Provider CRM: pipeline tracking and x402 verification of endpoint operators.
//!
//! [`CrmService`] owns the business rules on top of a [`CrmStore`]. Reads go straight to
//! the store. Writes are read-modify-write sequences (appending notes, summing sent sBTC,
//! allocating ids), so they are serialized behind one async mutex.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::CrmError;
use crate::probe::{ProbeResult, Prober};
use crate::store::{CrmStore, HistoryStore, ProviderStore};

pub mod types;

use types::{
    CrmCreateRequest, CrmEntry, CrmStats, CrmUpdateRequest, HistoryRecord, Lead, PipelineStatus,
    ProviderRecord, VerificationHistoryEntry, VerificationStatus, WeeklyStats,
};

/// Number of history entries returned per provider.
pub const HISTORY_LIMIT: usize = 50;

const SLUG_MAX_LEN: usize = 30;
const SUFFIX_LEN: usize = 4;

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));
static LEADING_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9.-]+)").expect("valid host regex"));

/// Result of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NoChanges,
}

/// Result of probing a provider's endpoint and recording the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub provider_id: String,
    pub probe: ProbeResult,
}

pub struct CrmService {
    store: Arc<dyn CrmStore>,
    prober: Prober,
    write_lock: Mutex<()>,
}

impl CrmService {
    pub fn new(store: Arc<dyn CrmStore>, prober: Prober) -> Self {
        Self {
            store,
            prober,
            write_lock: Mutex::new(()),
        }
    }

    async fn require(&self, provider_id: &str) -> Result<ProviderRecord, CrmError> {
        ProviderStore::get(&*self.store, provider_id)
            .await?
            .ok_or_else(|| CrmError::NotFound(provider_id.to_string()))
    }

    pub async fn list_entries(&self) -> Result<Vec<CrmEntry>, CrmError> {
        let records = ProviderStore::list(&*self.store).await?;
        Ok(records.iter().map(CrmEntry::from).collect())
    }

    pub async fn list_leads(&self) -> Result<Vec<Lead>, CrmError> {
        let records = ProviderStore::list(&*self.store).await?;
        Ok(records.iter().map(Lead::from).collect())
    }

    pub async fn get(&self, provider_id: &str) -> Result<CrmEntry, CrmError> {
        let record = self.require(provider_id).await?;
        Ok(CrmEntry::from(&record))
    }

    /// Newest verification attempts first. Unknown providers have an empty history.
    pub async fn history(
        &self,
        provider_id: &str,
    ) -> Result<Vec<VerificationHistoryEntry>, CrmError> {
        let records = HistoryStore::list(&*self.store, provider_id, HISTORY_LIMIT).await?;
        Ok(records
            .into_iter()
            .map(VerificationHistoryEntry::from)
            .collect())
    }

    pub async fn stats(&self) -> Result<CrmStats, CrmError> {
        let records = ProviderStore::list(&*self.store).await?;
        let week_ago = Utc::now() - Duration::days(7);

        let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_chain: BTreeMap<String, u64> = BTreeMap::new();
        let mut stats = CrmStats {
            total_providers: records.len() as u64,
            ..CrmStats::default()
        };
        for record in &records {
            *by_status
                .entry(record.pipeline_status.to_string())
                .or_default() += 1;
            let chain = record
                .chain
                .as_deref()
                .filter(|chain| !chain.is_empty())
                .unwrap_or("unknown");
            *by_chain.entry(chain.to_string()).or_default() += 1;
            if record.supports_sbtc {
                stats.supports_sbtc_count += 1;
            }
            if record.verification_status == Some(VerificationStatus::Passed) {
                stats.verified_count += 1;
            }
            stats.total_sbtc_sent = stats
                .total_sbtc_sent
                .saturating_add(record.sbtc_sent_total);
        }

        stats.by_status = by_status;
        stats.by_chain = by_chain;
        stats.this_week = WeeklyStats {
            new_providers: records
                .iter()
                .filter(|record| record.created_at >= week_ago)
                .count() as u64,
            verifications: self.store.count_since(week_ago).await?,
            conversions: records
                .iter()
                .filter(|record| {
                    record.pipeline_status == PipelineStatus::Converted
                        && record.updated_at >= week_ago
                })
                .count() as u64,
        };
        Ok(stats)
    }

    /// Adds a provider and returns its `provider_id`.
    #[instrument(skip_all, err)]
    pub async fn create(&self, request: CrmCreateRequest) -> Result<String, CrmError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();

        let provider_id = match request.provider_id.filter(|id| !id.is_empty()) {
            Some(provider_id) => provider_id,
            None => generate_provider_id(
                request.name.as_deref(),
                request.company.as_deref(),
                now,
            ),
        };
        if ProviderStore::get(&*self.store, &provider_id)
            .await?
            .is_some()
        {
            return Err(CrmError::Conflict(provider_id));
        }

        let existing = ProviderStore::list(&*self.store).await?;
        let id = existing.iter().map(|record| record.id).max().unwrap_or(0) + 1;

        let mut record = ProviderRecord::new(id, provider_id.clone(), now);
        record.domain = request
            .domain
            .filter(|domain| !domain.is_empty())
            .or_else(|| request.endpoint_url.as_deref().and_then(extract_domain));
        record.name = request.name;
        record.company = request.company;
        record.email = request.email;
        record.twitter = request.twitter;
        record.endpoint_url = request.endpoint_url;
        record.chain = Some(request.chain.unwrap_or_else(|| "unknown".to_string()));
        record.pipeline_status = request.pipeline_status.unwrap_or_default();
        record.notes = request.notes;
        record.estimated_mrr = Some(request.estimated_mrr.unwrap_or(0));

        self.store.upsert(record).await?;
        tracing::info!(%provider_id, id, "Provider created");
        Ok(provider_id)
    }

    #[instrument(skip(self, request), err)]
    pub async fn update(
        &self,
        provider_id: &str,
        request: CrmUpdateRequest,
    ) -> Result<UpdateOutcome, CrmError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.require(provider_id).await?;
        if request.is_empty() {
            return Ok(UpdateOutcome::NoChanges);
        }
        let now = Utc::now();

        if let Some(notes) = &request.notes {
            record.notes = Some(match record.notes.take().filter(|n| !n.is_empty()) {
                Some(existing) => format!("{existing}\n{notes}"),
                None => notes.clone(),
            });
        }
        if let Some(supports_sbtc) = request.supports_sbtc {
            record.supports_sbtc = supports_sbtc;
        }
        if let Some(pipeline_status) = request.pipeline_status {
            record.pipeline_status = pipeline_status;
        }
        if let Some(status) = request.verification_status {
            record.verification_status = Some(status);
            record.verification_timestamp = Some(now);
        }
        if let Some(tx_id) = &request.verification_tx_id {
            record.verification_tx_id = Some(tx_id.clone());
        }
        if let Some(sent) = request.sbtc_sent_total {
            record.sbtc_sent_total = record.sbtc_sent_total.checked_add(sent).ok_or_else(|| {
                CrmError::BadRequest(format!(
                    "sbtc_sent_total {sent} would overflow the running total of {}",
                    record.sbtc_sent_total
                ))
            })?;
        }
        if let Some(issue_url) = &request.issue_url {
            record.issue_url = Some(issue_url.clone());
        }
        if let Some(endpoint_url) = &request.endpoint_url {
            if record.domain.as_deref().is_none_or(str::is_empty) {
                record.domain = extract_domain(endpoint_url);
            }
            record.endpoint_url = Some(endpoint_url.clone());
        }
        record.updated_at = now;
        let endpoint_tested = record.endpoint_url.clone();
        self.store.upsert(record).await?;

        if let Some(status) = request.verification_status {
            self.store
                .append(HistoryRecord {
                    provider_id: provider_id.to_string(),
                    timestamp: now,
                    status,
                    tx_id: request.verification_tx_id,
                    amount_sats: request.sbtc_sent_total,
                    error: match status {
                        VerificationStatus::Failed => request.notes,
                        _ => None,
                    },
                    endpoint_tested,
                })
                .await?;
        }
        tracing::info!("Provider updated");
        Ok(UpdateOutcome::Updated)
    }

    /// Removes a provider and its verification history.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, provider_id: &str) -> Result<(), CrmError> {
        let _guard = self.write_lock.lock().await;
        if !self.store.delete(provider_id).await? {
            return Err(CrmError::NotFound(provider_id.to_string()));
        }
        self.store.purge(provider_id).await?;
        tracing::info!("Provider deleted");
        Ok(())
    }

    /// Probes the provider's endpoint and records the outcome.
    ///
    /// The probe runs without holding the write lock; the record is re-read afterwards so
    /// concurrent edits made during the probe are kept.
    #[instrument(skip(self), err)]
    pub async fn verify(&self, provider_id: &str) -> Result<VerifyOutcome, CrmError> {
        let record = self.require(provider_id).await?;
        let target = record
            .probe_target()
            .filter(|target| !target.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CrmError::MissingEndpoint(provider_id.to_string()))?;

        let probe = self.prober.probe(&target).await;

        let _guard = self.write_lock.lock().await;
        let mut record = self.require(provider_id).await?;
        let now = Utc::now();
        let status = if probe.success {
            VerificationStatus::Passed
        } else {
            VerificationStatus::Failed
        };
        record.verification_status = Some(status);
        record.verification_timestamp = Some(now);
        if probe.success {
            record.supports_sbtc = probe.has_stacks;
        }
        record.updated_at = now;
        self.store.upsert(record).await?;
        self.store
            .append(HistoryRecord {
                provider_id: provider_id.to_string(),
                timestamp: now,
                status,
                tx_id: None,
                amount_sats: probe.amount.as_deref().and_then(parse_amount_sats),
                error: probe.error.clone(),
                endpoint_tested: Some(target),
            })
            .await?;

        tracing::info!(success = probe.success, has_stacks = probe.has_stacks, "Provider verified");
        Ok(VerifyOutcome {
            success: probe.success,
            provider_id: provider_id.to_string(),
            probe,
        })
    }
}

/// Absolute value of an integer amount. Amounts outside `i64` are absent.
fn parse_amount_sats(amount: &str) -> Option<i64> {
    amount.trim().parse::<i64>().ok().and_then(i64::checked_abs)
}

fn base36_suffix(millis: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = millis.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
        if n == 0 || digits.len() == SUFFIX_LEN {
            break;
        }
    }
    digits.iter().rev().collect()
}

/// Builds a readable id from the provider's name and company, e.g. `alex-chen-solanafi-k3x9`.
pub fn generate_provider_id(
    name: Option<&str>,
    company: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let joined = format!("{}-{}", name.unwrap_or_default(), company.unwrap_or_default());
    let lowered = joined.to_lowercase();
    let replaced = NON_ALNUM.replace_all(&lowered, "-");
    let slug: String = replaced.trim_matches('-').chars().take(SLUG_MAX_LEN).collect();
    let suffix = base36_suffix(now.timestamp_millis());
    if slug.is_empty() {
        format!("provider-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

/// Host part of an endpoint URL; scheme-less input is read as `https`.
pub fn extract_domain(endpoint_url: &str) -> Option<String> {
    let endpoint_url = endpoint_url.trim();
    let candidate = if endpoint_url.starts_with("http") {
        endpoint_url.to_string()
    } else {
        format!("https://{endpoint_url}")
    };
    if let Some(host) = url::Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    {
        return Some(host);
    }
    LEADING_HOST
        .captures(endpoint_url)
        .map(|captures| captures[1].to_string())
}
