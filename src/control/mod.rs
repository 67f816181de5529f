//! Periodic control loop
//!
//! Runs the fraud sweep, quality recompute, trust recompute, pacing
//! rebalance and retention sweep on one cadence. Steps are isolated: a
//! store hiccup in one is caught and reported without short-circuiting
//! the rest, so the cycle summary carries partial counts instead of
//! aborting wholesale. Each cycle is idempotent; a failed step simply
//! catches up on the next cycle.

pub mod integrity;
pub mod pacing;
pub mod retention;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::Config;
use crate::error::Result;
use crate::store::AdStore;

pub use integrity::{
    CtrQualityModel, FraudRules, IntegrityController, QualityModel, RuleBasedFraudDetector,
};
pub use pacing::PacingController;
pub use retention::RetentionSweeper;

/// Outcome of one control-loop step
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    Ok { count: u64 },
    Failed { error: String },
}

impl StepResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepResult::Ok { .. })
    }

    /// Progress made; zero for a failed step
    pub fn count(&self) -> u64 {
        match self {
            StepResult::Ok { count } => *count,
            StepResult::Failed { .. } => 0,
        }
    }

    fn from_step(name: &str, result: Result<u64>) -> Self {
        match result {
            Ok(count) => StepResult::Ok { count },
            Err(e) => {
                error!(step = name, error = %e, "control-loop step failed");
                StepResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// One full cycle's aggregated outcome
#[derive(Debug, Clone, Serialize)]
pub struct ControlSummary {
    pub success: bool,
    pub fraud_events_flagged: StepResult,
    pub quality_scores_updated: StepResult,
    pub trust_scores_updated: StepResult,
    pub pacing_updated: StepResult,
    pub traffic_events_cleaned: StepResult,
    pub computed_at: DateTime<Utc>,
}

impl ControlSummary {
    pub fn errors(&self) -> Vec<String> {
        [
            &self.fraud_events_flagged,
            &self.quality_scores_updated,
            &self.trust_scores_updated,
            &self.pacing_updated,
            &self.traffic_events_cleaned,
        ]
        .into_iter()
        .filter_map(|step| match step {
            StepResult::Failed { error } => Some(error.clone()),
            StepResult::Ok { .. } => None,
        })
        .collect()
    }
}

pub struct ControlLoop {
    integrity: IntegrityController,
    pacing: PacingController,
    retention: RetentionSweeper,
}

impl ControlLoop {
    /// Wire the default controllers from config
    pub fn new(store: Arc<dyn AdStore>, config: &Config) -> Self {
        Self {
            integrity: IntegrityController::new(
                store.clone(),
                Box::new(CtrQualityModel),
                Box::new(RuleBasedFraudDetector::new(config.fraud.clone())),
                config.control.clone(),
            ),
            pacing: PacingController::new(store.clone(), config.pacing.clone()),
            retention: RetentionSweeper::new(store, config.control.retention_days),
        }
    }

    pub fn with_controllers(
        integrity: IntegrityController,
        pacing: PacingController,
        retention: RetentionSweeper,
    ) -> Self {
        Self {
            integrity,
            pacing,
            retention,
        }
    }

    /// Run one full cycle without short-circuiting.
    ///
    /// Fraud runs before quality and trust so both recomputes see the
    /// freshly invalidated events; re-running a cycle against unchanged
    /// traffic then reproduces identical scores.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> ControlSummary {
        let fraud = StepResult::from_step("fraud_sweep", self.integrity.fraud_sweep(now).await);
        let quality =
            StepResult::from_step("quality_recompute", self.integrity.recompute_quality(now).await);
        let trust =
            StepResult::from_step("trust_recompute", self.integrity.recompute_trust(now).await);
        let pacing = StepResult::from_step("pacing_recompute", self.pacing.run(now).await);
        let cleaned = StepResult::from_step("retention_sweep", self.retention.run(now).await);

        let summary = ControlSummary {
            success: fraud.is_ok()
                && quality.is_ok()
                && trust.is_ok()
                && pacing.is_ok()
                && cleaned.is_ok(),
            fraud_events_flagged: fraud,
            quality_scores_updated: quality,
            trust_scores_updated: trust,
            pacing_updated: pacing,
            traffic_events_cleaned: cleaned,
            computed_at: now,
        };

        info!(
            success = summary.success,
            fraud_flagged = summary.fraud_events_flagged.count(),
            quality_updated = summary.quality_scores_updated.count(),
            trust_updated = summary.trust_scores_updated.count(),
            pacing_updated = summary.pacing_updated.count(),
            events_cleaned = summary.traffic_events_cleaned.count(),
            "control cycle complete"
        );

        summary
    }

    /// Run cycles forever on the configured cadence. Not latency
    /// sensitive; safe to overlap with any number of concurrent auctions.
    pub async fn run_scheduled(self: Arc<Self>, interval_secs: u64) {
        let mut ticker = interval(std::time::Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_cycle(Utc::now()).await;
        }
    }
}
