//! Pure expected-value scoring
//!
//! EV = bid x p_ctr x p_cvr x p_lead_quality x intent_weight
//!      x trust_multiplier x fairness_multiplier x pacing_factor
//!
//! The pacing factor term is the one explicit feedback point where the
//! control loop's delivery signal reaches the auction ranking.

use serde::Serialize;

use super::types::IntentTier;
use crate::store::CandidateRow;

/// Fairness multiplier bounds
pub const FAIRNESS_MIN: f64 = 0.9;
pub const FAIRNESS_MAX: f64 = 1.15;

/// Step table mapping a 0-100 trust score to an EV multiplier.
/// Candidates below 40 are filtered before scoring; the 0.70 band is
/// defense-in-depth should one reach this point anyway.
pub fn trust_multiplier(trust_score: f64) -> f64 {
    if trust_score >= 90.0 {
        1.18
    } else if trust_score >= 75.0 {
        1.10
    } else if trust_score >= 60.0 {
        1.00
    } else if trust_score >= 40.0 {
        0.88
    } else {
        0.70
    }
}

/// Bounded adjustment favoring lower-spend advertisers, derived from the
/// advertiser's trailing share of impression charges. A zero-spend
/// advertiser gets the full boost; a dominant spender is damped to the
/// lower bound.
pub fn fairness_multiplier(spend_share: f64) -> f64 {
    let share = spend_share.clamp(0.0, 1.0);
    (FAIRNESS_MAX - 0.25 * share).clamp(FAIRNESS_MIN, FAIRNESS_MAX)
}

/// Clamp a bid into the admissible charge band for a slot and tier.
/// If a misconfigured slot's floor exceeds the tier ceiling, the ceiling
/// wins: the tier cap is a hard limit on what we may charge.
pub fn clamp_charge(bid_cents: u64, floor_cents: u64, tier: IntentTier) -> u64 {
    bid_cents.max(floor_cents).min(tier.ceiling_cents())
}

/// One candidate after scoring, carrying everything the audit row needs
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub advertiser_id: String,
    pub campaign_id: String,
    pub creative_id: String,
    pub bid_cents: u64,
    pub charge_cents: u64,
    pub p_ctr: f64,
    pub p_cvr: f64,
    pub p_lead_quality: f64,
    pub trust_multiplier: f64,
    pub fairness_multiplier: f64,
    pub pacing_factor: f64,
    pub ev: f64,
}

/// Score one candidate row for a slot/tier pair
pub fn score_candidate(
    row: &CandidateRow,
    tier: IntentTier,
    floor_cents: u64,
    pacing_factor: f64,
) -> ScoredCandidate {
    let trust = trust_multiplier(row.trust_score);
    let fairness = fairness_multiplier(row.spend_share);

    let ev = row.bid_cents as f64
        * row.p_ctr
        * row.p_cvr
        * row.p_lead_quality
        * tier.intent_weight()
        * trust
        * fairness
        * pacing_factor;

    ScoredCandidate {
        advertiser_id: row.advertiser_id.clone(),
        campaign_id: row.campaign_id.clone(),
        creative_id: row.creative_id.clone(),
        bid_cents: row.bid_cents,
        charge_cents: clamp_charge(row.bid_cents, floor_cents, tier),
        p_ctr: row.p_ctr,
        p_cvr: row.p_cvr,
        p_lead_quality: row.p_lead_quality,
        trust_multiplier: trust,
        fairness_multiplier: fairness,
        pacing_factor,
        ev,
    }
}

/// Pick the winner: maximum EV, ties broken deterministically by lowest
/// advertiser id so replays of the same inputs always agree
pub fn select_winner(candidates: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    candidates.iter().reduce(|best, candidate| {
        if candidate.ev > best.ev
            || (candidate.ev == best.ev && candidate.advertiser_id < best.advertiser_id)
        {
            candidate
        } else {
            best
        }
    })
}
