//! In-memory eligibility store
//!
//! DashMap-backed [`AdStore`] implementation. Backs the test suite and
//! local serving; a production deployment wraps the marketplace's managed
//! store behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::types::*;
use super::AdStore;
use crate::error::{Error, Result};
use crate::ledger::BudgetLedger;

/// Per-campaign bid and prediction inputs. The prediction models that
/// produce the probabilities live outside this engine; these are
/// already-computed numbers.
#[derive(Debug, Clone)]
pub struct BidProfile {
    pub bid_cents: u64,
    pub p_ctr: f64,
    pub p_cvr: f64,
    pub p_lead_quality: f64,
}

/// Days of impression history feeding the trailing spend share
const SPEND_SHARE_WINDOW_DAYS: i64 = 14;

pub struct MemoryStore {
    ledger: Arc<BudgetLedger>,
    slots: DashMap<String, AdSlot>,
    accounts: DashMap<String, AdvertiserAccount>,
    campaigns: DashMap<String, Campaign>,
    creatives: DashMap<String, Creative>,
    bids: DashMap<String, BidProfile>,
    impressions: DashMap<String, ImpressionRecord>,
    events: DashMap<String, TrafficEvent>,
    pacing: DashMap<(String, NaiveDate), PacingRecord>,
    trust: DashMap<String, AdvertiserTrustScore>,
}

impl MemoryStore {
    pub fn new(ledger: Arc<BudgetLedger>) -> Self {
        Self {
            ledger,
            slots: DashMap::new(),
            accounts: DashMap::new(),
            campaigns: DashMap::new(),
            creatives: DashMap::new(),
            bids: DashMap::new(),
            impressions: DashMap::new(),
            events: DashMap::new(),
            pacing: DashMap::new(),
            trust: DashMap::new(),
        }
    }

    // Seed operations, used by local serving and tests. The managed store
    // owns these rows in production.

    pub fn add_slot(&self, slot: AdSlot) {
        self.slots.insert(slot.slot_id.clone(), slot);
    }

    pub fn add_account(&self, account: AdvertiserAccount) {
        self.accounts.insert(account.advertiser_id.clone(), account);
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.campaign_id.clone(), campaign);
    }

    pub fn add_creative(&self, creative: Creative) {
        self.creatives.insert(creative.creative_id.clone(), creative);
    }

    pub fn set_bid_profile(&self, campaign_id: &str, profile: BidProfile) {
        self.bids.insert(campaign_id.to_string(), profile);
    }

    pub fn add_event(&self, event: TrafficEvent) {
        self.events.insert(event.event_id.clone(), event);
    }

    /// Overwrite an account's trust score (the integrity controller's
    /// write path back into the account row)
    pub fn set_account_trust(&self, advertiser_id: &str, trust_score: f64) {
        if let Some(mut account) = self.accounts.get_mut(advertiser_id) {
            account.trust_score = trust_score;
        }
    }

    pub fn impression(&self, request_id: &str) -> Option<ImpressionRecord> {
        self.impressions.get(request_id).map(|r| r.clone())
    }

    pub fn trust_row(&self, advertiser_id: &str) -> Option<AdvertiserTrustScore> {
        self.trust.get(advertiser_id).map(|r| r.clone())
    }

    pub fn creative_quality(&self, creative_id: &str) -> Option<f64> {
        self.creatives.get(creative_id).map(|c| c.quality_score)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn event_is_valid(&self, event_id: &str) -> Option<bool> {
        self.events.get(event_id).map(|e| e.is_valid)
    }

    /// Advertiser's fraction of all impression charges over the trailing
    /// spend-share window; 0.0 when there is no history at all
    fn spend_share(&self, advertiser_id: &str, now: DateTime<Utc>) -> f64 {
        let since = now - Duration::days(SPEND_SHARE_WINDOW_DAYS);
        let mut total: u64 = 0;
        let mut mine: u64 = 0;
        for record in self.impressions.iter() {
            if record.timestamp < since {
                continue;
            }
            total += record.charge_cents;
            if record.advertiser_id == advertiser_id {
                mine += record.charge_cents;
            }
        }
        if total == 0 {
            0.0
        } else {
            mine as f64 / total as f64
        }
    }

    /// Lowest-id active campaign with a bid profile and at least one
    /// creative, so candidate construction is deterministic
    fn servable_campaign(&self, advertiser_id: &str) -> Option<(Campaign, Creative, BidProfile)> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.advertiser_id == advertiser_id && c.status == CampaignStatus::Active)
            .map(|c| c.clone())
            .collect();
        campaigns.sort_by(|a, b| a.campaign_id.cmp(&b.campaign_id));

        for campaign in campaigns {
            let profile = match self.bids.get(&campaign.campaign_id) {
                Some(p) => p.clone(),
                None => continue,
            };
            let mut creatives: Vec<Creative> = self
                .creatives
                .iter()
                .filter(|c| c.campaign_id == campaign.campaign_id)
                .map(|c| c.clone())
                .collect();
            creatives.sort_by(|a, b| a.creative_id.cmp(&b.creative_id));
            if let Some(creative) = creatives.into_iter().next() {
                return Some((campaign, creative, profile));
            }
        }
        None
    }
}

#[async_trait]
impl AdStore for MemoryStore {
    async fn slot(&self, slot_id: &str) -> Result<Option<AdSlot>> {
        Ok(self.slots.get(slot_id).map(|s| s.clone()))
    }

    async fn candidate_rows(&self, _slot_id: &str) -> Result<Vec<CandidateRow>> {
        let now = Utc::now();
        let mut rows = Vec::new();

        for account in self.accounts.iter() {
            let (campaign, creative, profile) = match self.servable_campaign(&account.advertiser_id)
            {
                Some(triple) => triple,
                None => continue,
            };

            rows.push(CandidateRow {
                advertiser_id: account.advertiser_id.clone(),
                campaign_id: campaign.campaign_id,
                creative_id: creative.creative_id,
                account_status: account.status,
                trust_score: account.trust_score,
                balance_cents: self.ledger.balance(&account.advertiser_id).unwrap_or(0),
                bid_cents: profile.bid_cents,
                p_ctr: profile.p_ctr,
                p_cvr: profile.p_cvr,
                p_lead_quality: profile.p_lead_quality,
                spend_share: self.spend_share(&account.advertiser_id, now),
            });
        }

        rows.sort_by(|a, b| a.advertiser_id.cmp(&b.advertiser_id));
        Ok(rows)
    }

    async fn record_impression(&self, record: ImpressionRecord) -> Result<()> {
        if self.impressions.contains_key(&record.request_id) {
            return Err(Error::DuplicateImpression(record.request_id));
        }
        self.impressions.insert(record.request_id.clone(), record);
        Ok(())
    }

    async fn active_campaigns(&self) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .map(|c| c.clone())
            .collect();
        campaigns.sort_by(|a, b| a.campaign_id.cmp(&b.campaign_id));
        Ok(campaigns)
    }

    async fn creatives_for_campaign(&self, campaign_id: &str) -> Result<Vec<Creative>> {
        Ok(self
            .creatives
            .iter()
            .filter(|c| c.campaign_id == campaign_id)
            .map(|c| c.clone())
            .collect())
    }

    async fn impressions_today(&self, campaign_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let today = now.date_naive();
        Ok(self
            .impressions
            .iter()
            .filter(|r| r.campaign_id == campaign_id && r.timestamp.date_naive() == today)
            .count() as u64)
    }

    async fn upsert_pacing(&self, record: PacingRecord) -> Result<()> {
        self.pacing
            .insert((record.campaign_id.clone(), record.date), record);
        Ok(())
    }

    async fn pacing_factor(&self, campaign_id: &str, date: NaiveDate) -> Result<Option<f64>> {
        Ok(self
            .pacing
            .get(&(campaign_id.to_string(), date))
            .map(|r| r.pacing_factor))
    }

    async fn traffic_stats(
        &self,
        advertiser_id: &str,
        since: DateTime<Utc>,
    ) -> Result<TrafficStats> {
        let mut stats = TrafficStats::default();
        for event in self.events.iter() {
            if event.advertiser_id != advertiser_id || event.occurred_at < since {
                continue;
            }
            stats.total_events += 1;
            if !event.is_valid {
                stats.invalid_events += 1;
            }
        }
        Ok(stats)
    }

    async fn recent_events(&self, since: DateTime<Utc>) -> Result<Vec<TrafficEvent>> {
        let mut events: Vec<TrafficEvent> = self
            .events
            .iter()
            .filter(|e| e.occurred_at >= since)
            .map(|e| e.clone())
            .collect();
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(events)
    }

    async fn mark_events_invalid(&self, event_ids: &[String]) -> Result<u64> {
        let mut changed = 0;
        for event_id in event_ids {
            if let Some(mut event) = self.events.get_mut(event_id) {
                if event.is_valid {
                    event.is_valid = false;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn replace_trust_score(&self, score: AdvertiserTrustScore) -> Result<()> {
        self.set_account_trust(&score.advertiser_id, score.trust_score);
        self.trust.insert(score.advertiser_id.clone(), score);
        Ok(())
    }

    async fn set_creative_quality(&self, creative_id: &str, score: f64) -> Result<()> {
        match self.creatives.get_mut(creative_id) {
            Some(mut creative) => {
                creative.quality_score = score;
                Ok(())
            }
            None => Err(Error::Internal(format!(
                "Unknown creative: {}",
                creative_id
            ))),
        }
    }

    async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let before = self.events.len();
        self.events.retain(|_, e| e.occurred_at >= cutoff);
        Ok((before - self.events.len()) as u64)
    }
}
