//! REST API handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::auction::{AuctionRequest, AuctionResult};
use crate::error::Error;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Winning ad payload; charge is dollars on the wire
#[derive(Debug, Serialize, Deserialize)]
pub struct AdPayload {
    pub advertiser_id: String,
    pub request_id: String,
    pub charge: f64,
}

/// Auction response: either a win with `status: success` or an explicit
/// no-fill with its reason
#[derive(Debug, Serialize, Deserialize)]
pub struct AuctionResponse {
    pub ad: Option<AdPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error body for 4xx/5xx responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: &Error) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// POST /api/auction - run one auction for a placement request
pub async fn run_auction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuctionRequest>,
) -> Response {
    match state.engine.run(&request).await {
        Ok(AuctionResult::Won {
            advertiser_id,
            request_id,
            charge_cents,
        }) => Json(AuctionResponse {
            ad: Some(AdPayload {
                advertiser_id,
                request_id,
                charge: charge_cents as f64 / 100.0,
            }),
            status: Some("success".to_string()),
            reason: None,
        })
        .into_response(),
        Ok(AuctionResult::NoFill { reason }) => Json(AuctionResponse {
            ad: None,
            status: None,
            reason: Some(reason.as_str().to_string()),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Fraud step counts, nested per the control-loop response contract
#[derive(Debug, Serialize, Deserialize)]
pub struct FraudSummary {
    pub events_flagged: u64,
}

/// Control-loop cycle summary
#[derive(Debug, Serialize, Deserialize)]
pub struct ControlRunResponse {
    pub success: bool,
    pub quality_scores_updated: u64,
    pub fraud: FraudSummary,
    pub pacing_updated: u64,
    pub trust_scores_updated: u64,
    pub traffic_events_cleaned: u64,
    pub computed_at: String,
    pub errors: Vec<String>,
}

/// POST /api/control/run - trigger one control-loop cycle
///
/// Step failures do not fail the request: the summary reports partial
/// counts with `success: false` and the per-step errors.
pub async fn run_control_cycle(State(state): State<Arc<AppState>>) -> Json<ControlRunResponse> {
    let summary = state.control.run_cycle(Utc::now()).await;

    Json(ControlRunResponse {
        success: summary.success,
        quality_scores_updated: summary.quality_scores_updated.count(),
        fraud: FraudSummary {
            events_flagged: summary.fraud_events_flagged.count(),
        },
        pacing_updated: summary.pacing_updated.count(),
        trust_scores_updated: summary.trust_scores_updated.count(),
        traffic_events_cleaned: summary.traffic_events_cleaned.count(),
        computed_at: summary.computed_at.to_rfc3339(),
        errors: summary.errors(),
    })
}
