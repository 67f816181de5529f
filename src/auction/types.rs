//! Auction request/result types

use serde::{Deserialize, Serialize};

/// Categorical signal of request value; tier_1 is the highest and drives
/// both the intent weight and the price ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentTier {
    #[serde(rename = "tier_1")]
    Tier1,
    #[serde(rename = "tier_2")]
    Tier2,
    #[serde(rename = "tier_3")]
    Tier3,
}

impl Default for IntentTier {
    fn default() -> Self {
        IntentTier::Tier3
    }
}

impl IntentTier {
    /// Fixed EV weight per tier
    pub fn intent_weight(&self) -> f64 {
        match self {
            IntentTier::Tier1 => 2.5,
            IntentTier::Tier2 => 1.4,
            IntentTier::Tier3 => 1.0,
        }
    }

    /// Maximum admissible charge per tier, in cents
    pub fn ceiling_cents(&self) -> u64 {
        match self {
            IntentTier::Tier1 => 4_000,
            IntentTier::Tier2 => 2_200,
            IntentTier::Tier3 => 1_200,
        }
    }
}

/// One incoming placement request
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionRequest {
    pub slot_id: String,
    #[serde(default)]
    pub geo: Option<String>,
    #[serde(default)]
    pub intent_tier: IntentTier,
}

/// Why an auction produced no ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFillReason {
    /// No eligible candidates after filtering (benign, not an error)
    NoFill,
    /// Candidates existed but none could afford their charge at commit
    BudgetExhausted,
    /// Candidates existed but selection produced no winner
    NoAuctionWinner,
}

impl NoFillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoFillReason::NoFill => "no_fill",
            NoFillReason::BudgetExhausted => "budget_exhausted",
            NoFillReason::NoAuctionWinner => "no_auction_winner",
        }
    }
}

/// Tagged outcome of one auction
#[derive(Debug, Clone, PartialEq)]
pub enum AuctionResult {
    Won {
        advertiser_id: String,
        request_id: String,
        charge_cents: u64,
    },
    NoFill {
        reason: NoFillReason,
    },
}

impl AuctionResult {
    pub fn is_won(&self) -> bool {
        matches!(self, AuctionResult::Won { .. })
    }
}
