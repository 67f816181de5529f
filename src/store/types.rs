//! Eligibility store data model
//!
//! Rows the engine reads from and writes to the marketplace's managed
//! store. Money fields carry integer cents end to end; the HTTP surface
//! converts to dollar floats at the boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A sellable ad placement on the site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSlot {
    pub slot_id: String,
    /// Minimum admissible charge for this slot
    pub floor_price_cents: u64,
    /// Inactive slots reject all auctions (toggled by external admin)
    pub is_active: bool,
}

/// Advertiser account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

/// Advertiser account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertiserAccount {
    pub advertiser_id: String,
    pub status: AccountStatus,
    /// 0-100 reputation signal, owned exclusively by the integrity
    /// controller; the auction only reads it
    pub trust_score: f64,
}

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
}

/// One campaign under an advertiser; lifecycle managed externally,
/// read-only to this engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: String,
    pub advertiser_id: String,
    pub daily_cap_cents: u64,
    pub status: CampaignStatus,
}

/// One creative under a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creative {
    pub creative_id: String,
    pub campaign_id: String,
    /// 0-100, recomputed each control cycle
    pub quality_score: f64,
}

/// Append-only audit row, one per winning auction. Never mutated after
/// creation; the sole source of truth for what was charged and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionRecord {
    pub request_id: String,
    pub advertiser_id: String,
    pub campaign_id: String,
    pub creative_id: String,
    pub slot_id: String,
    pub bid_cents: u64,
    pub charge_cents: u64,
    pub p_ctr: f64,
    pub p_cvr: f64,
    pub p_lead_quality: f64,
    pub trust_multiplier: f64,
    pub fairness_multiplier: f64,
    pub pacing_factor: f64,
    pub timestamp: DateTime<Utc>,
}

/// Kind of raw traffic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficEventKind {
    Impression,
    Click,
    Conversion,
}

/// Raw traffic event; `is_valid` is flipped by the fraud sweep and the
/// row is purged after the retention window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub event_id: String,
    pub advertiser_id: String,
    pub creative_id: String,
    pub kind: TrafficEventKind,
    /// Origin identifier (IP bucket, referrer domain, ...)
    pub source: String,
    pub is_valid: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Per (campaign, day) delivery pacing state, upserted idempotently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingRecord {
    pub campaign_id: String,
    pub date: NaiveDate,
    pub target_impressions: u64,
    pub delivered_impressions: u64,
    /// Always within [0.1, 5.0]
    pub pacing_factor: f64,
    pub computed_at: DateTime<Utc>,
}

/// Per-advertiser trust state, fully replaced each recompute cycle so it
/// never drifts from its inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertiserTrustScore {
    pub advertiser_id: String,
    pub trust_score: f64,
    pub creative_quality: f64,
    pub total_events: u64,
    pub invalid_events: u64,
    pub last_computed_at: DateTime<Utc>,
}

/// Joined candidate row for one advertiser with an active campaign
/// targeting a slot. Unfiltered: eligibility filtering happens in the
/// auction engine, not the store.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub advertiser_id: String,
    pub campaign_id: String,
    pub creative_id: String,
    pub account_status: AccountStatus,
    pub trust_score: f64,
    pub balance_cents: u64,
    pub bid_cents: u64,
    pub p_ctr: f64,
    pub p_cvr: f64,
    pub p_lead_quality: f64,
    /// Trailing share of all impression charges attributed to this
    /// advertiser, in [0, 1]; feeds the fairness multiplier
    pub spend_share: f64,
}

/// Aggregate event counts for one advertiser over a trailing window
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficStats {
    pub total_events: u64,
    pub invalid_events: u64,
}
