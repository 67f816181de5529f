//! HTTP surface
//!
//! Two operational endpoints plus health: the synchronous auction on the
//! page-render critical path, and the control-loop trigger used by the
//! scheduler and by operators running a cycle by hand.

mod api;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::auction::AuctionEngine;
use crate::control::ControlLoop;

pub use api::{AdPayload, AuctionResponse, ControlRunResponse, ErrorResponse, HealthResponse};

/// Shared state behind the router
pub struct AppState {
    pub engine: AuctionEngine,
    pub control: Arc<ControlLoop>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: AuctionEngine, control: Arc<ControlLoop>) -> Self {
        Self {
            engine,
            control,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/auction", post(api::run_auction))
        .route("/api/control/run", post(api::run_control_cycle))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ledger::BudgetLedger;
    use crate::store::memory::BidProfile;
    use crate::store::*;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn test_server() -> (TestServer, Arc<MemoryStore>, Arc<BudgetLedger>) {
        let config = Config::default();
        let ledger = Arc::new(BudgetLedger::new(config.auction.max_debit_attempts));
        let store = Arc::new(MemoryStore::new(ledger.clone()));

        store.add_slot(AdSlot {
            slot_id: "slot_1".to_string(),
            floor_price_cents: 200,
            is_active: true,
        });

        let engine = AuctionEngine::new(store.clone(), ledger.clone(), config.auction.clone());
        let control = Arc::new(ControlLoop::new(store.clone(), &config));
        let state = Arc::new(AppState::new(engine, control));
        (
            TestServer::new(create_router(state)).unwrap(),
            store,
            ledger,
        )
    }

    fn seed_advertiser(store: &MemoryStore, ledger: &BudgetLedger, advertiser_id: &str, balance: u64) {
        ledger.insert(advertiser_id, balance);
        store.add_account(AdvertiserAccount {
            advertiser_id: advertiser_id.to_string(),
            status: AccountStatus::Active,
            trust_score: 80.0,
        });
        let campaign_id = format!("{}_camp", advertiser_id);
        store.add_campaign(Campaign {
            campaign_id: campaign_id.clone(),
            advertiser_id: advertiser_id.to_string(),
            daily_cap_cents: 10_000,
            status: CampaignStatus::Active,
        });
        store.add_creative(Creative {
            creative_id: format!("{}_cr", advertiser_id),
            campaign_id: campaign_id.clone(),
            quality_score: 50.0,
        });
        store.set_bid_profile(
            &campaign_id,
            BidProfile {
                bid_cents: 1_500,
                p_ctr: 0.05,
                p_cvr: 0.2,
                p_lead_quality: 0.8,
            },
        );
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _, _) = test_server();
        let response = server.get("/api/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_auction_win_payload() {
        let (server, store, ledger) = test_server();
        seed_advertiser(&store, &ledger, "adv_a", 5_000);

        let response = server
            .post("/api/auction")
            .json(&json!({"slot_id": "slot_1", "intent_tier": "tier_3"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "success");
        assert_eq!(body["ad"]["advertiser_id"], "adv_a");
        // bid $15 clamped to the tier_3 ceiling, dollars on the wire
        assert_eq!(body["ad"]["charge"], 12.0);
        assert!(body["ad"]["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_auction_no_fill_payload() {
        let (server, _, _) = test_server();

        let response = server
            .post("/api/auction")
            .json(&json!({"slot_id": "slot_1"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert!(body["ad"].is_null());
        assert_eq!(body["reason"], "no_fill");
    }

    #[tokio::test]
    async fn test_auction_invalid_slot_is_400() {
        let (server, _, _) = test_server();

        let response = server
            .post("/api/auction")
            .json(&json!({"slot_id": "missing"}))
            .await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_auction_budget_exhausted_payload() {
        let (server, store, ledger) = test_server();
        // balance covers nothing: bid $15 clamps to $12, balance $5
        seed_advertiser(&store, &ledger, "adv_a", 500);

        let response = server
            .post("/api/auction")
            .json(&json!({"slot_id": "slot_1"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert!(body["ad"].is_null());
        assert_eq!(body["reason"], "budget_exhausted");
        assert_eq!(ledger.balance("adv_a"), Some(500));
    }

    #[tokio::test]
    async fn test_control_run_summary_shape() {
        let (server, store, ledger) = test_server();
        seed_advertiser(&store, &ledger, "adv_a", 5_000);

        let response = server.post("/api/control/run").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["quality_scores_updated"], 1);
        assert_eq!(body["trust_scores_updated"], 1);
        assert_eq!(body["pacing_updated"], 1);
        assert_eq!(body["fraud"]["events_flagged"], 0);
        assert_eq!(body["traffic_events_cleaned"], 0);
        assert!(body["computed_at"].as_str().is_some());
        assert!(body["errors"].as_array().unwrap().is_empty());
    }
}
