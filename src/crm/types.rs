//! Provider records, verification history, and their API views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stage of a provider in the sales pipeline.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Meeting,
    Onboarding,
    Converted,
    Lost,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::New => "new",
            PipelineStatus::Contacted => "contacted",
            PipelineStatus::Qualified => "qualified",
            PipelineStatus::Meeting => "meeting",
            PipelineStatus::Onboarding => "onboarding",
            PipelineStatus::Converted => "converted",
            PipelineStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the most recent x402 verification of a provider.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Passed,
    Failed,
}

/// A tracked endpoint operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: u64,
    pub provider_id: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub twitter: Option<String>,
    pub domain: Option<String>,
    pub endpoint_url: Option<String>,
    pub chain: Option<String>,
    pub pipeline_status: PipelineStatus,
    pub supports_sbtc: bool,
    pub notes: Option<String>,
    pub estimated_mrr: Option<i64>,
    pub verification_status: Option<VerificationStatus>,
    pub verification_tx_id: Option<String>,
    pub verification_timestamp: Option<DateTime<Utc>>,
    /// Running total of sBTC sent to the provider, in sats.
    pub sbtc_sent_total: i64,
    pub issue_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderRecord {
    /// A fresh record with every optional field unset.
    pub fn new<S: Into<String>>(id: u64, provider_id: S, now: DateTime<Utc>) -> Self {
        Self {
            id,
            provider_id: provider_id.into(),
            name: None,
            company: None,
            email: None,
            twitter: None,
            domain: None,
            endpoint_url: None,
            chain: None,
            pipeline_status: PipelineStatus::New,
            supports_sbtc: false,
            notes: None,
            estimated_mrr: None,
            verification_status: None,
            verification_tx_id: None,
            verification_timestamp: None,
            sbtc_sent_total: 0,
            issue_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Endpoint to probe: the configured URL, else the bare domain.
    pub fn probe_target(&self) -> Option<&str> {
        self.endpoint_url.as_deref().or(self.domain.as_deref())
    }
}

/// One verification attempt against a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub provider_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: VerificationStatus,
    pub tx_id: Option<String>,
    pub amount_sats: Option<i64>,
    pub error: Option<String>,
    pub endpoint_tested: Option<String>,
}

/// Provider fields synced from the registry, in the sbtc-appleseed entry format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_mrr: Option<i64>,
}

/// A provider in the sbtc-appleseed entry format.
///
/// Empty strings and zero amounts are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmEntry {
    pub provider_id: String,
    pub synced_data: SyncedData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub supports_sbtc: bool,
    pub pipeline_status: PipelineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_tx_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbtc_sent_total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn nonzero(value: i64) -> Option<i64> {
    (value != 0).then_some(value)
}

impl From<&ProviderRecord> for CrmEntry {
    fn from(record: &ProviderRecord) -> Self {
        CrmEntry {
            provider_id: record.provider_id.clone(),
            synced_data: SyncedData {
                domain: present(&record.domain),
                name: present(&record.name),
                company: present(&record.company),
                email: present(&record.email),
                twitter: present(&record.twitter),
                endpoint_url: present(&record.endpoint_url),
                chain: present(&record.chain),
                estimated_mrr: record.estimated_mrr.and_then(nonzero),
            },
            notes: present(&record.notes),
            supports_sbtc: record.supports_sbtc,
            pipeline_status: record.pipeline_status,
            verification_status: record.verification_status,
            verification_tx_id: present(&record.verification_tx_id),
            verification_timestamp: record.verification_timestamp,
            sbtc_sent_total: nonzero(record.sbtc_sent_total),
            issue_url: present(&record.issue_url),
        }
    }
}

/// A provider in the dashboard's lead format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: u64,
    pub provider_id: String,
    pub name: String,
    pub company: String,
    pub email: String,
    pub twitter: String,
    pub chain: String,
    pub endpoint: String,
    pub status: PipelineStatus,
    #[serde(rename = "lastContact")]
    pub last_contact: Option<DateTime<Utc>>,
    pub notes: String,
    pub mrr: i64,
    pub supports_sbtc: bool,
    pub verification_status: Option<VerificationStatus>,
    pub verification_tx_id: Option<String>,
}

impl From<&ProviderRecord> for Lead {
    fn from(record: &ProviderRecord) -> Self {
        let or = |value: &Option<String>, default: &str| {
            present(value).unwrap_or_else(|| default.to_string())
        };
        Lead {
            id: record.id,
            provider_id: record.provider_id.clone(),
            name: or(&record.name, "Unknown"),
            company: or(&record.company, "Unknown"),
            email: or(&record.email, ""),
            twitter: or(&record.twitter, ""),
            chain: or(&record.chain, "Unknown"),
            endpoint: present(&record.endpoint_url)
                .or_else(|| present(&record.domain))
                .unwrap_or_default(),
            status: record.pipeline_status,
            last_contact: Some(record.updated_at),
            notes: or(&record.notes, ""),
            mrr: record.estimated_mrr.unwrap_or_default(),
            supports_sbtc: record.supports_sbtc,
            verification_status: record.verification_status,
            verification_tx_id: record.verification_tx_id.clone(),
        }
    }
}

/// A verification attempt as shown in a provider's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: VerificationStatus,
    pub tx_id: Option<String>,
    pub amount_sats: Option<i64>,
    pub error: Option<String>,
    pub note: String,
}

impl From<HistoryRecord> for VerificationHistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        let note = match record.status {
            VerificationStatus::Passed => {
                format!("Verified: {} sats sent", record.amount_sats.unwrap_or_default())
            }
            _ => format!(
                "Failed: {}",
                record.error.as_deref().unwrap_or("unknown error")
            ),
        };
        VerificationHistoryEntry {
            timestamp: record.timestamp,
            status: record.status,
            tx_id: record.tx_id,
            amount_sats: record.amount_sats,
            error: record.error,
            note,
        }
    }
}

/// Activity over the last seven days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub new_providers: u64,
    pub verifications: u64,
    pub conversions: u64,
}

/// Aggregate pipeline statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmStats {
    pub total_providers: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_chain: BTreeMap<String, u64>,
    pub supports_sbtc_count: u64,
    pub verified_count: u64,
    pub total_sbtc_sent: i64,
    pub this_week: WeeklyStats,
}

/// Body of `POST /crm`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmCreateRequest {
    pub provider_id: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub twitter: Option<String>,
    pub domain: Option<String>,
    pub endpoint_url: Option<String>,
    pub chain: Option<String>,
    pub pipeline_status: Option<PipelineStatus>,
    pub notes: Option<String>,
    pub estimated_mrr: Option<i64>,
}

/// Body of `PUT /crm/{provider_id}`. Every field is optional; absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrmUpdateRequest {
    pub notes: Option<String>,
    pub supports_sbtc: Option<bool>,
    pub pipeline_status: Option<PipelineStatus>,
    pub verification_status: Option<VerificationStatus>,
    pub verification_tx_id: Option<String>,
    /// Added to the provider's running total.
    pub sbtc_sent_total: Option<i64>,
    pub issue_url: Option<String>,
    pub endpoint_url: Option<String>,
}

impl CrmUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self == &CrmUpdateRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> ProviderRecord {
        let now = "2026-01-14T10:00:00Z".parse().unwrap();
        ProviderRecord::new(3, "solanafi-ab12", now)
    }

    #[test]
    fn test_crm_entry_omits_empty_values() {
        let mut record = record();
        record.name = Some("Alex Chen".into());
        record.email = Some(String::new());
        record.estimated_mrr = Some(0);
        let json = serde_json::to_value(CrmEntry::from(&record)).unwrap();
        assert_eq!(
            json,
            json!({
                "provider_id": "solanafi-ab12",
                "synced_data": {"name": "Alex Chen"},
                "supports_sbtc": false,
                "pipeline_status": "new"
            })
        );
    }

    #[test]
    fn test_lead_defaults() {
        let mut record = record();
        record.domain = Some("api.solanafi.xyz".into());
        let lead = Lead::from(&record);
        assert_eq!(lead.name, "Unknown");
        assert_eq!(lead.company, "Unknown");
        assert_eq!(lead.chain, "Unknown");
        assert_eq!(lead.endpoint, "api.solanafi.xyz");
        assert_eq!(lead.mrr, 0);
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["lastContact"], "2026-01-14T10:00:00Z");
        assert_eq!(json["status"], "new");
    }

    #[test]
    fn test_history_notes() {
        let now = "2026-01-14T10:00:00Z".parse().unwrap();
        let passed = HistoryRecord {
            provider_id: "p".into(),
            timestamp: now,
            status: VerificationStatus::Passed,
            tx_id: None,
            amount_sats: Some(500),
            error: None,
            endpoint_tested: None,
        };
        let failed = HistoryRecord {
            status: VerificationStatus::Failed,
            amount_sats: None,
            ..passed.clone()
        };
        assert_eq!(VerificationHistoryEntry::from(passed).note, "Verified: 500 sats sent");
        assert_eq!(VerificationHistoryEntry::from(failed).note, "Failed: unknown error");
    }

    #[test]
    fn test_update_request_is_empty() {
        assert!(CrmUpdateRequest::default().is_empty());
        let request: CrmUpdateRequest = serde_json::from_value(json!({"notes": "hi"})).unwrap();
        assert!(!request.is_empty());
    }

    #[test]
    fn test_pipeline_status_wire_format() {
        let status: PipelineStatus = serde_json::from_value(json!("onboarding")).unwrap();
        assert_eq!(status, PipelineStatus::Onboarding);
        assert_eq!(status.to_string(), "onboarding");
        assert!(serde_json::from_value::<PipelineStatus>(json!("Onboarding")).is_err());
    }
}
