//! Per-request auction engine
//!
//! One invocation per incoming placement request, on the page-render
//! critical path. The read/score phase runs under a hard timeout and
//! fails open to no-fill; the commit phase (debit + audit row) either
//! completes or is compensated, so a win always means exactly one debit
//! and one impression record.

pub mod scoring;
pub mod types;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuctionConfig;
use crate::error::{Error, Result};
use crate::ledger::{BudgetLedger, DebitOutcome};
use crate::store::{AccountStatus, AdSlot, AdStore, ImpressionRecord};

pub use scoring::{fairness_multiplier, score_candidate, select_winner, trust_multiplier, ScoredCandidate};
pub use types::{AuctionRequest, AuctionResult, IntentTier, NoFillReason};

/// Outcome of the timed read/score phase
enum Prepared {
    /// Scored candidates with positive EV, ready for commit
    Contenders { candidates: Vec<ScoredCandidate> },
    /// Nothing eligible, or nothing with positive EV
    Empty { reason: NoFillReason },
}

pub struct AuctionEngine {
    store: Arc<dyn AdStore>,
    ledger: Arc<BudgetLedger>,
    config: AuctionConfig,
}

impl AuctionEngine {
    pub fn new(store: Arc<dyn AdStore>, ledger: Arc<BudgetLedger>, config: AuctionConfig) -> Self {
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Run one auction. Exactly one debit and one audit row on a win;
    /// zero side effects on any no-fill path.
    pub async fn run(&self, request: &AuctionRequest) -> Result<AuctionResult> {
        let deadline = Duration::from_millis(self.config.timeout_ms);

        let prepared = match timeout(deadline, self.prepare(request)).await {
            Ok(prepared) => prepared?,
            Err(_) => {
                // Fail open: the caller is rendering a page and must not
                // block on us. Nothing was debited yet.
                warn!(
                    slot_id = %request.slot_id,
                    timeout_ms = self.config.timeout_ms,
                    "auction timed out, failing open to no-fill"
                );
                return Ok(AuctionResult::NoFill {
                    reason: NoFillReason::NoFill,
                });
            }
        };

        let candidates = match prepared {
            Prepared::Contenders { candidates } => candidates,
            Prepared::Empty { reason } => {
                debug!(slot_id = %request.slot_id, reason = reason.as_str(), "no fill");
                return Ok(AuctionResult::NoFill { reason });
            }
        };

        self.commit(request, candidates).await
    }

    /// Resolve the slot, build the eligible candidate set, score it
    async fn prepare(&self, request: &AuctionRequest) -> Result<Prepared> {
        let slot = match self.store.slot(&request.slot_id).await? {
            Some(slot) if slot.is_active => slot,
            _ => return Err(Error::InvalidSlot(request.slot_id.clone())),
        };

        let rows = self.store.candidate_rows(&request.slot_id).await?;

        let eligible: Vec<_> = rows
            .into_iter()
            .filter(|row| {
                row.account_status == AccountStatus::Active
                    && row.trust_score >= self.config.min_trust_score
                    && row.balance_cents > 0
            })
            .collect();

        if eligible.is_empty() {
            return Ok(Prepared::Empty {
                reason: NoFillReason::NoFill,
            });
        }

        let today = Utc::now().date_naive();
        let mut candidates = Vec::with_capacity(eligible.len());
        for row in &eligible {
            let pacing = self
                .store
                .pacing_factor(&row.campaign_id, today)
                .await?
                .unwrap_or(self.config.default_pacing_factor);
            candidates.push(self.score(row, &slot, request.intent_tier, pacing));
        }

        candidates.retain(|c| c.ev > 0.0);
        if candidates.is_empty() {
            return Ok(Prepared::Empty {
                reason: NoFillReason::NoAuctionWinner,
            });
        }

        Ok(Prepared::Contenders { candidates })
    }

    fn score(
        &self,
        row: &crate::store::CandidateRow,
        slot: &AdSlot,
        tier: IntentTier,
        pacing_factor: f64,
    ) -> ScoredCandidate {
        scoring::score_candidate(row, tier, slot.floor_price_cents, pacing_factor)
    }

    /// Select, debit, persist. A winner that cannot afford its charge at
    /// commit time is dropped and selection re-runs among the rest.
    async fn commit(
        &self,
        request: &AuctionRequest,
        mut candidates: Vec<ScoredCandidate>,
    ) -> Result<AuctionResult> {
        let mut budget_rejected = false;

        while let Some(winner) = scoring::select_winner(&candidates).cloned() {
            // Cheap pre-check before the CAS; the debit below re-verifies
            // at write time, so this only avoids doomed attempts.
            let balance = self.ledger.balance(&winner.advertiser_id).unwrap_or(0);
            if balance < winner.charge_cents {
                debug!(
                    advertiser_id = %winner.advertiser_id,
                    balance_cents = balance,
                    charge_cents = winner.charge_cents,
                    "winner cannot afford charge, re-selecting"
                );
                budget_rejected = true;
                candidates.retain(|c| c.advertiser_id != winner.advertiser_id);
                continue;
            }

            match self.ledger.try_debit(&winner.advertiser_id, winner.charge_cents) {
                DebitOutcome::Debited { remaining_cents } => {
                    return self.persist_win(request, &winner, remaining_cents).await;
                }
                DebitOutcome::Insufficient { .. }
                | DebitOutcome::Contended
                | DebitOutcome::UnknownAdvertiser => {
                    // Concurrent auctions drained this advertiser between
                    // scoring and commit; drop it and re-select.
                    budget_rejected = true;
                    candidates.retain(|c| c.advertiser_id != winner.advertiser_id);
                }
            }
        }

        let reason = if budget_rejected {
            NoFillReason::BudgetExhausted
        } else {
            NoFillReason::NoAuctionWinner
        };
        debug!(slot_id = %request.slot_id, reason = reason.as_str(), "no fill after selection");
        Ok(AuctionResult::NoFill { reason })
    }

    async fn persist_win(
        &self,
        request: &AuctionRequest,
        winner: &ScoredCandidate,
        remaining_cents: u64,
    ) -> Result<AuctionResult> {
        let request_id = Uuid::new_v4().to_string();
        let record = ImpressionRecord {
            request_id: request_id.clone(),
            advertiser_id: winner.advertiser_id.clone(),
            campaign_id: winner.campaign_id.clone(),
            creative_id: winner.creative_id.clone(),
            slot_id: request.slot_id.clone(),
            bid_cents: winner.bid_cents,
            charge_cents: winner.charge_cents,
            p_ctr: winner.p_ctr,
            p_cvr: winner.p_cvr,
            p_lead_quality: winner.p_lead_quality,
            trust_multiplier: winner.trust_multiplier,
            fairness_multiplier: winner.fairness_multiplier,
            pacing_factor: winner.pacing_factor,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.store.record_impression(record).await {
            // The debit already happened; compensate so the commit is
            // all-or-nothing from the advertiser's point of view.
            self.ledger.credit(&winner.advertiser_id, winner.charge_cents);
            warn!(
                advertiser_id = %winner.advertiser_id,
                error = %e,
                "audit write failed, debit refunded"
            );
            return Err(Error::StoreUnavailable(e.to_string()));
        }

        info!(
            slot_id = %request.slot_id,
            advertiser_id = %winner.advertiser_id,
            request_id = %request_id,
            charge_cents = winner.charge_cents,
            ev = winner.ev,
            remaining_cents,
            "auction won"
        );

        Ok(AuctionResult::Won {
            advertiser_id: winner.advertiser_id.clone(),
            request_id,
            charge_cents: winner.charge_cents,
        })
    }
}
