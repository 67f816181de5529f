//! Pacing controller
//!
//! Recomputes each active campaign's delivery pacing factor against an
//! even spend curve across the UTC day. The factor is consumed by the
//! auction engine as an EV multiplier on its next invocation.

use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::config::PacingConfig;
use crate::error::Result;
use crate::store::{AdStore, PacingRecord};

/// Lower and upper bound for the pacing factor
pub const PACING_FACTOR_MIN: f64 = 0.1;
pub const PACING_FACTOR_MAX: f64 = 5.0;

/// Daily impression target from the campaign cap and the assumed cost
/// per impression; at least 1 so the pacing math never divides by zero
pub fn target_impressions(daily_cap_cents: u64, assumed_cpm_cents: u64) -> u64 {
    (daily_cap_cents / assumed_cpm_cents.max(1)).max(1)
}

/// Fraction of the UTC day elapsed at `now`, in [0, 1)
pub fn elapsed_fraction_of_day(now: DateTime<Utc>) -> f64 {
    now.num_seconds_from_midnight() as f64 / 86_400.0
}

/// clamp(expected_by_now / max(delivered, 1), 0.1, 5.0)
pub fn pacing_factor(target: u64, delivered: u64, elapsed_fraction: f64) -> f64 {
    let expected_by_now = target as f64 * elapsed_fraction;
    (expected_by_now / delivered.max(1) as f64).clamp(PACING_FACTOR_MIN, PACING_FACTOR_MAX)
}

pub struct PacingController {
    store: Arc<dyn AdStore>,
    config: PacingConfig,
}

impl PacingController {
    pub fn new(store: Arc<dyn AdStore>, config: PacingConfig) -> Self {
        Self { store, config }
    }

    /// Recompute and upsert one PacingRecord per active campaign.
    /// Idempotent: re-running with no new impressions reproduces the
    /// same factor for the same `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<u64> {
        let campaigns = self.store.active_campaigns().await?;
        let elapsed = elapsed_fraction_of_day(now);
        let today = now.date_naive();
        let mut updated = 0;

        for campaign in campaigns {
            let target = target_impressions(campaign.daily_cap_cents, self.config.assumed_cpm_cents);
            let delivered = self.store.impressions_today(&campaign.campaign_id, now).await?;
            let factor = pacing_factor(target, delivered, elapsed);

            debug!(
                campaign_id = %campaign.campaign_id,
                target,
                delivered,
                factor,
                "pacing recomputed"
            );

            self.store
                .upsert_pacing(PacingRecord {
                    campaign_id: campaign.campaign_id.clone(),
                    date: today,
                    target_impressions: target,
                    delivered_impressions: delivered,
                    pacing_factor: factor,
                    computed_at: now,
                })
                .await?;
            updated += 1;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_impressions_floor_of_one() {
        assert_eq!(target_impressions(10, 50), 1);
        assert_eq!(target_impressions(0, 50), 1);
    }

    #[test]
    fn test_target_from_cap_and_cpm() {
        // daily_cap $100, assumed CPM $0.50 -> 200 impressions
        assert_eq!(target_impressions(10_000, 50), 200);
    }

    #[test]
    fn test_pacing_factor_midday_behind_pace() {
        // target 200, 50% of day elapsed, 40 delivered -> 100/40 = 2.5
        let factor = pacing_factor(200, 40, 0.5);
        assert!((factor - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_pacing_factor_bounded_with_zero_delivered() {
        // delivered=0 divides by max(0,1)=1 and the clamp bounds the rest
        let factor = pacing_factor(100_000, 0, 0.9);
        assert_eq!(factor, PACING_FACTOR_MAX);
    }

    #[test]
    fn test_pacing_factor_bounded_when_far_ahead() {
        let factor = pacing_factor(10, 100_000, 0.5);
        assert_eq!(factor, PACING_FACTOR_MIN);
    }

    #[test]
    fn test_pacing_factor_always_in_bounds() {
        for target in [1u64, 10, 200, 1_000_000] {
            for delivered in [0u64, 1, 50, 1_000_000] {
                for elapsed in [0.0, 0.25, 0.5, 0.999] {
                    let factor = pacing_factor(target, delivered, elapsed);
                    assert!((PACING_FACTOR_MIN..=PACING_FACTOR_MAX).contains(&factor));
                }
            }
        }
    }

    #[test]
    fn test_elapsed_fraction_at_noon() {
        let noon = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        assert!((elapsed_fraction_of_day(noon) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_fraction_at_midnight() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(elapsed_fraction_of_day(midnight), 0.0);
    }
}
