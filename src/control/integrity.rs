//! Integrity controller
//!
//! Three scheduled recompute steps: creative quality, fraud detection
//! over raw traffic, and the per-advertiser trust score the auction's
//! trust multiplier feeds on. Quality scoring and fraud rules are trait
//! seams; the deployments that own real models plug in behind them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ControlConfig, FraudConfig};
use crate::error::Result;
use crate::store::{AdStore, AdvertiserTrustScore, Creative, TrafficEvent, TrafficEventKind};

/// Quality used for an advertiser with no creatives at all
pub const DEFAULT_CREATIVE_QUALITY: f64 = 50.0;

/// Invalid-event count above which the trust formula applies a flat
/// 20-point penalty
const INVALID_EVENT_PENALTY_THRESHOLD: u64 = 10;

/// External scoring routine producing a 0-100 quality score for one
/// creative from its accumulated traffic
pub trait QualityModel: Send + Sync {
    fn score(&self, creative: &Creative, events: &[TrafficEvent]) -> f64;
}

/// Default model: CTR/CVR actuals over valid events, anchored at the
/// neutral midpoint so a creative with no traffic keeps a 50
pub struct CtrQualityModel;

impl QualityModel for CtrQualityModel {
    fn score(&self, _creative: &Creative, events: &[TrafficEvent]) -> f64 {
        let mut impressions = 0u64;
        let mut clicks = 0u64;
        let mut conversions = 0u64;

        for event in events.iter().filter(|e| e.is_valid) {
            match event.kind {
                TrafficEventKind::Impression => impressions += 1,
                TrafficEventKind::Click => clicks += 1,
                TrafficEventKind::Conversion => conversions += 1,
            }
        }

        if impressions == 0 {
            return DEFAULT_CREATIVE_QUALITY;
        }

        let ctr = clicks as f64 / impressions as f64;
        let cvr = if clicks == 0 {
            0.0
        } else {
            conversions as f64 / clicks as f64
        };

        // A 5% CTR fully earns the CTR half of the band; CVR fills the rest
        let score = DEFAULT_CREATIVE_QUALITY + (ctr / 0.05).min(1.0) * 30.0 + cvr * 20.0;
        score.clamp(0.0, 100.0)
    }
}

/// External rule engine over recent traffic events; returns the ids of
/// events to invalidate
pub trait FraudRules: Send + Sync {
    fn flag(&self, events: &[TrafficEvent], now: DateTime<Utc>) -> Vec<String>;
}

/// Default rule set: blocklisted origins, per-source click floods, and
/// single-source hammering of one creative
pub struct RuleBasedFraudDetector {
    config: FraudConfig,
}

/// Any-kind event count from one (source, creative) pair above this is
/// treated as bot hammering
const REPEAT_SOURCE_LIMIT: usize = 50;

impl RuleBasedFraudDetector {
    pub fn new(config: FraudConfig) -> Self {
        Self { config }
    }
}

impl FraudRules for RuleBasedFraudDetector {
    fn flag(&self, events: &[TrafficEvent], now: DateTime<Utc>) -> Vec<String> {
        let mut flagged: HashSet<String> = HashSet::new();
        let window_start = now - Duration::seconds(self.config.click_flood_window_secs);

        // Blocklisted origins: everything from them is invalid
        for event in events {
            if self.config.blocked_sources.iter().any(|s| s == &event.source) {
                flagged.insert(event.event_id.clone());
            }
        }

        // Click floods: too many clicks from one source inside the window
        let mut clicks_by_source: HashMap<&str, Vec<&TrafficEvent>> = HashMap::new();
        for event in events {
            if event.kind == TrafficEventKind::Click && event.occurred_at >= window_start {
                clicks_by_source.entry(&event.source).or_default().push(event);
            }
        }
        for (source, clicks) in &clicks_by_source {
            if clicks.len() >= self.config.click_flood_threshold {
                debug!(source = %source, count = clicks.len(), "click flood detected");
                for event in clicks {
                    flagged.insert(event.event_id.clone());
                }
            }
        }

        // Repeated source: one source hammering one creative
        let mut by_source_creative: HashMap<(&str, &str), Vec<&TrafficEvent>> = HashMap::new();
        for event in events {
            by_source_creative
                .entry((&event.source, &event.creative_id))
                .or_default()
                .push(event);
        }
        for ((source, creative_id), group) in &by_source_creative {
            if group.len() >= REPEAT_SOURCE_LIMIT {
                debug!(source = %source, creative_id = %creative_id, count = group.len(), "repeated source detected");
                for event in group {
                    flagged.insert(event.event_id.clone());
                }
            }
        }

        // Only report events that are still valid, so a second sweep over
        // the same traffic flags nothing new
        let mut ids: Vec<String> = events
            .iter()
            .filter(|e| e.is_valid && flagged.contains(&e.event_id))
            .map(|e| e.event_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// clamp(100 - fraud_rate*200 + avg_quality*0.3 - penalty, 0, 100)
pub fn trust_score(total_events: u64, invalid_events: u64, avg_creative_quality: f64) -> f64 {
    let fraud_rate = invalid_events as f64 / total_events.max(1) as f64;
    let penalty = if invalid_events > INVALID_EVENT_PENALTY_THRESHOLD {
        20.0
    } else {
        0.0
    };
    (100.0 - fraud_rate * 200.0 + avg_creative_quality * 0.3 - penalty).clamp(0.0, 100.0)
}

pub struct IntegrityController {
    store: Arc<dyn AdStore>,
    quality_model: Box<dyn QualityModel>,
    fraud_rules: Box<dyn FraudRules>,
    config: ControlConfig,
}

impl IntegrityController {
    pub fn new(
        store: Arc<dyn AdStore>,
        quality_model: Box<dyn QualityModel>,
        fraud_rules: Box<dyn FraudRules>,
        config: ControlConfig,
    ) -> Self {
        Self {
            store,
            quality_model,
            fraud_rules,
            config,
        }
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.config.trailing_window_days)
    }

    /// Recompute every active campaign's creative quality scores.
    /// Returns rows touched.
    pub async fn recompute_quality(&self, now: DateTime<Utc>) -> Result<u64> {
        let events = self.store.recent_events(self.window_start(now)).await?;
        let mut by_creative: HashMap<&str, Vec<TrafficEvent>> = HashMap::new();
        for event in &events {
            by_creative
                .entry(event.creative_id.as_str())
                .or_default()
                .push(event.clone());
        }

        let mut touched = 0;
        for campaign in self.store.active_campaigns().await? {
            for creative in self.store.creatives_for_campaign(&campaign.campaign_id).await? {
                let creative_events = by_creative
                    .get(creative.creative_id.as_str())
                    .map(|v| v.as_slice())
                    .unwrap_or(&[]);
                let score = self.quality_model.score(&creative, creative_events);
                self.store
                    .set_creative_quality(&creative.creative_id, score)
                    .await?;
                touched += 1;
            }
        }

        debug!(touched, "creative quality recomputed");
        Ok(touched)
    }

    /// Run the fraud rules over recent events and invalidate matches.
    /// Returns events flagged.
    pub async fn fraud_sweep(&self, now: DateTime<Utc>) -> Result<u64> {
        let events = self.store.recent_events(self.window_start(now)).await?;
        let flagged = self.fraud_rules.flag(&events, now);
        if flagged.is_empty() {
            return Ok(0);
        }
        let changed = self.store.mark_events_invalid(&flagged).await?;
        info!(flagged = changed, "fraud sweep invalidated events");
        Ok(changed)
    }

    /// Replace the trust row for every advertiser with at least one
    /// active campaign. Returns advertisers updated.
    pub async fn recompute_trust(&self, now: DateTime<Utc>) -> Result<u64> {
        let campaigns = self.store.active_campaigns().await?;

        let mut by_advertiser: HashMap<String, Vec<String>> = HashMap::new();
        for campaign in campaigns {
            by_advertiser
                .entry(campaign.advertiser_id.clone())
                .or_default()
                .push(campaign.campaign_id.clone());
        }

        let since = self.window_start(now);
        let mut updated = 0;

        for (advertiser_id, campaign_ids) in by_advertiser {
            let stats = self.store.traffic_stats(&advertiser_id, since).await?;

            let mut qualities = Vec::new();
            for campaign_id in &campaign_ids {
                for creative in self.store.creatives_for_campaign(campaign_id).await? {
                    qualities.push(creative.quality_score);
                }
            }
            let avg_quality = if qualities.is_empty() {
                DEFAULT_CREATIVE_QUALITY
            } else {
                qualities.iter().sum::<f64>() / qualities.len() as f64
            };

            let score = trust_score(stats.total_events, stats.invalid_events, avg_quality);

            self.store
                .replace_trust_score(AdvertiserTrustScore {
                    advertiser_id: advertiser_id.clone(),
                    trust_score: score,
                    creative_quality: avg_quality,
                    total_events: stats.total_events,
                    invalid_events: stats.invalid_events,
                    last_computed_at: now,
                })
                .await?;

            debug!(
                advertiser_id = %advertiser_id,
                trust = score,
                total_events = stats.total_events,
                invalid_events = stats.invalid_events,
                "trust recomputed"
            );
            updated += 1;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        event_id: &str,
        creative_id: &str,
        kind: TrafficEventKind,
        source: &str,
        age_secs: i64,
        now: DateTime<Utc>,
    ) -> TrafficEvent {
        TrafficEvent {
            event_id: event_id.to_string(),
            advertiser_id: "adv_a".to_string(),
            creative_id: creative_id.to_string(),
            kind,
            source: source.to_string(),
            is_valid: true,
            occurred_at: now - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_trust_formula_clamped_at_ceiling() {
        // 1000 events, 10 invalid, avg quality 70:
        // 100 - 0.01*200 + 21 - 0 = 119 -> clamped to 100
        assert_eq!(trust_score(1000, 10, 70.0), 100.0);
    }

    #[test]
    fn test_trust_formula_with_penalty() {
        // fraud_rate 0.05 -> -10; quality 70 -> +21; 50 invalid -> -20
        let score = trust_score(1000, 50, 70.0);
        assert!((score - 91.0).abs() < 1e-9);
    }

    #[test]
    fn test_trust_formula_penalty_threshold() {
        // 10 invalid events: no penalty; 11: penalty
        let at_threshold = trust_score(1000, 10, 50.0);
        let above_threshold = trust_score(1000, 11, 50.0);
        assert!(at_threshold > above_threshold + 19.0);
    }

    #[test]
    fn test_trust_formula_floor() {
        assert_eq!(trust_score(100, 100, 0.0), 0.0);
    }

    #[test]
    fn test_trust_formula_no_events_is_neutral() {
        // fraud_rate 0/max(0,1)=0, quality default 50 -> 115 -> clamp 100
        assert_eq!(trust_score(0, 0, DEFAULT_CREATIVE_QUALITY), 100.0);
    }

    #[test]
    fn test_quality_model_neutral_without_impressions() {
        let model = CtrQualityModel;
        let creative = Creative {
            creative_id: "cr_1".to_string(),
            campaign_id: "camp_1".to_string(),
            quality_score: 50.0,
        };
        assert_eq!(model.score(&creative, &[]), DEFAULT_CREATIVE_QUALITY);
    }

    #[test]
    fn test_quality_model_rewards_ctr_and_cvr() {
        let model = CtrQualityModel;
        let creative = Creative {
            creative_id: "cr_1".to_string(),
            campaign_id: "camp_1".to_string(),
            quality_score: 50.0,
        };
        let now = Utc::now();
        let mut events = Vec::new();
        for i in 0..100 {
            events.push(event(
                &format!("imp_{}", i),
                "cr_1",
                TrafficEventKind::Impression,
                "10.0.0.1",
                i,
                now,
            ));
        }
        for i in 0..5 {
            events.push(event(
                &format!("clk_{}", i),
                "cr_1",
                TrafficEventKind::Click,
                "10.0.0.1",
                i,
                now,
            ));
        }
        events.push(event("cnv_0", "cr_1", TrafficEventKind::Conversion, "10.0.0.1", 1, now));

        // CTR 5% earns the full 30; CVR 20% earns 4
        let score = model.score(&creative, &events);
        assert!((score - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_model_ignores_invalid_events() {
        let model = CtrQualityModel;
        let creative = Creative {
            creative_id: "cr_1".to_string(),
            campaign_id: "camp_1".to_string(),
            quality_score: 50.0,
        };
        let now = Utc::now();
        let mut flooded = event("clk_0", "cr_1", TrafficEventKind::Click, "bot", 1, now);
        flooded.is_valid = false;
        let events = vec![
            event("imp_0", "cr_1", TrafficEventKind::Impression, "10.0.0.1", 1, now),
            flooded,
        ];
        // The invalid click contributes nothing: CTR 0
        assert_eq!(model.score(&creative, &events), DEFAULT_CREATIVE_QUALITY);
    }

    #[test]
    fn test_fraud_rules_blocklist() {
        let detector = RuleBasedFraudDetector::new(FraudConfig {
            blocked_sources: vec!["evil.example".to_string()],
            ..FraudConfig::default()
        });
        let now = Utc::now();
        let events = vec![
            event("ev_0", "cr_1", TrafficEventKind::Impression, "evil.example", 10, now),
            event("ev_1", "cr_1", TrafficEventKind::Impression, "10.0.0.1", 10, now),
        ];
        assert_eq!(detector.flag(&events, now), vec!["ev_0".to_string()]);
    }

    #[test]
    fn test_fraud_rules_click_flood() {
        let detector = RuleBasedFraudDetector::new(FraudConfig {
            click_flood_threshold: 5,
            click_flood_window_secs: 300,
            blocked_sources: vec![],
        });
        let now = Utc::now();
        let mut events = Vec::new();
        for i in 0..6 {
            events.push(event(
                &format!("flood_{}", i),
                "cr_1",
                TrafficEventKind::Click,
                "10.9.9.9",
                i,
                now,
            ));
        }
        // One organic click from another source stays valid
        events.push(event("ok_0", "cr_1", TrafficEventKind::Click, "10.0.0.1", 5, now));

        let flagged = detector.flag(&events, now);
        assert_eq!(flagged.len(), 6);
        assert!(!flagged.contains(&"ok_0".to_string()));
    }

    #[test]
    fn test_fraud_rules_ignore_clicks_outside_window() {
        let detector = RuleBasedFraudDetector::new(FraudConfig {
            click_flood_threshold: 5,
            click_flood_window_secs: 300,
            blocked_sources: vec![],
        });
        let now = Utc::now();
        let mut events = Vec::new();
        for i in 0..6 {
            // All clicks well outside the 300s window
            events.push(event(
                &format!("old_{}", i),
                "cr_1",
                TrafficEventKind::Click,
                "10.9.9.9",
                3_600 + i,
                now,
            ));
        }
        assert!(detector.flag(&events, now).is_empty());
    }

    #[test]
    fn test_fraud_rules_second_pass_flags_nothing_new() {
        let detector = RuleBasedFraudDetector::new(FraudConfig {
            click_flood_threshold: 5,
            click_flood_window_secs: 300,
            blocked_sources: vec![],
        });
        let now = Utc::now();
        let mut events = Vec::new();
        for i in 0..6 {
            events.push(event(
                &format!("flood_{}", i),
                "cr_1",
                TrafficEventKind::Click,
                "10.9.9.9",
                i,
                now,
            ));
        }

        let first = detector.flag(&events, now);
        assert_eq!(first.len(), 6);

        // Apply the flags, then sweep again over the same traffic
        for event in events.iter_mut() {
            if first.contains(&event.event_id) {
                event.is_valid = false;
            }
        }
        assert!(detector.flag(&events, now).is_empty());
    }
}
