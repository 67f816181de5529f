//! Eligibility store access
//!
//! The marketplace's managed store owns advertisers, budgets, campaigns,
//! creatives and slots; this engine only touches the fields below. The
//! [`AdStore`] trait is the seam between the engine and whatever backs it
//! (the in-memory store here, the managed store in production).

pub mod memory;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
pub use memory::MemoryStore;
pub use types::*;

/// Read/write surface the engine needs from the eligibility store.
///
/// Every method can fail with `Error::StoreUnavailable`; the auction path
/// surfaces that to the caller, the control loop isolates it per step.
#[async_trait]
pub trait AdStore: Send + Sync {
    /// Resolve one slot by id
    async fn slot(&self, slot_id: &str) -> Result<Option<AdSlot>>;

    /// One unfiltered row per advertiser with an active campaign that
    /// could serve this slot. Filtering is the engine's job.
    async fn candidate_rows(&self, slot_id: &str) -> Result<Vec<CandidateRow>>;

    /// Append one audit row; `request_id` must be unique
    async fn record_impression(&self, record: ImpressionRecord) -> Result<()>;

    /// All campaigns with status Active
    async fn active_campaigns(&self) -> Result<Vec<Campaign>>;

    /// Creatives belonging to one campaign
    async fn creatives_for_campaign(&self, campaign_id: &str) -> Result<Vec<Creative>>;

    /// Impressions recorded today (UTC) for one campaign's creatives
    async fn impressions_today(&self, campaign_id: &str, now: DateTime<Utc>) -> Result<u64>;

    /// Upsert keyed by (campaign_id, date)
    async fn upsert_pacing(&self, record: PacingRecord) -> Result<()>;

    /// Current pacing factor for (campaign_id, date), if computed
    async fn pacing_factor(&self, campaign_id: &str, date: NaiveDate) -> Result<Option<f64>>;

    /// Event counts for one advertiser's creatives since `since`
    async fn traffic_stats(&self, advertiser_id: &str, since: DateTime<Utc>)
        -> Result<TrafficStats>;

    /// Events that occurred at or after `since` (fraud sweep input)
    async fn recent_events(&self, since: DateTime<Utc>) -> Result<Vec<TrafficEvent>>;

    /// Flip `is_valid = false` on the given events; returns rows changed
    async fn mark_events_invalid(&self, event_ids: &[String]) -> Result<u64>;

    /// Full replace-upsert of one advertiser's trust row
    async fn replace_trust_score(&self, score: AdvertiserTrustScore) -> Result<()>;

    /// Overwrite one creative's quality score
    async fn set_creative_quality(&self, creative_id: &str, score: f64) -> Result<()>;

    /// Delete events older than `cutoff`; returns rows deleted
    async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
