//! Command implementations for the adserver binary

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::auction::AuctionEngine;
use crate::config::Config;
use crate::control::ControlLoop;
use crate::ledger::BudgetLedger;
use crate::server::{create_router, AppState};
use crate::store::memory::BidProfile;
use crate::store::{
    AdSlot, AdvertiserAccount, Campaign, Creative, MemoryStore, TrafficEvent,
};

/// Seed file for local serving: inventory rows the managed store would
/// own in production
#[derive(Debug, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub slots: Vec<AdSlot>,
    #[serde(default)]
    pub accounts: Vec<AdvertiserAccount>,
    #[serde(default)]
    pub budgets: Vec<SeedBudget>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub creatives: Vec<Creative>,
    #[serde(default)]
    pub bid_profiles: Vec<SeedBidProfile>,
    #[serde(default)]
    pub events: Vec<TrafficEvent>,
}

#[derive(Debug, Deserialize)]
pub struct SeedBudget {
    pub advertiser_id: String,
    pub remaining_balance_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct SeedBidProfile {
    pub campaign_id: String,
    pub bid_cents: u64,
    pub p_ctr: f64,
    pub p_cvr: f64,
    pub p_lead_quality: f64,
}

fn load_seed(store: &MemoryStore, ledger: &BudgetLedger, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read seed file {}", path.display()))?;
    let seed: SeedData = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid seed file {}", path.display()))?;

    for slot in seed.slots {
        store.add_slot(slot);
    }
    for account in seed.accounts {
        store.add_account(account);
    }
    for budget in seed.budgets {
        ledger.insert(&budget.advertiser_id, budget.remaining_balance_cents);
    }
    for campaign in seed.campaigns {
        store.add_campaign(campaign);
    }
    for creative in seed.creatives {
        store.add_creative(creative);
    }
    for profile in seed.bid_profiles {
        store.set_bid_profile(
            &profile.campaign_id,
            BidProfile {
                bid_cents: profile.bid_cents,
                p_ctr: profile.p_ctr,
                p_cvr: profile.p_cvr,
                p_lead_quality: profile.p_lead_quality,
            },
        );
    }
    for event in seed.events {
        store.add_event(event);
    }

    info!(seed = %path.display(), "inventory seeded");
    Ok(())
}

fn build_runtime(config: &Config, seed: Option<&Path>) -> Result<(AuctionEngine, Arc<ControlLoop>)> {
    let ledger = Arc::new(BudgetLedger::new(config.auction.max_debit_attempts));
    let store = Arc::new(MemoryStore::new(ledger.clone()));

    if let Some(path) = seed {
        load_seed(&store, &ledger, path)?;
    }

    let engine = AuctionEngine::new(store.clone(), ledger, config.auction.clone());
    let control = Arc::new(ControlLoop::new(store, config));
    Ok((engine, control))
}

/// Run the HTTP server plus the scheduled control loop
pub async fn serve(config: &Config, seed: Option<&Path>) -> Result<()> {
    let (engine, control) = build_runtime(config, seed)?;

    let interval_secs = config.control.interval_secs;
    tokio::spawn(control.clone().run_scheduled(interval_secs));
    info!(interval_secs, "control-loop scheduler started");

    let state = Arc::new(AppState::new(engine, control));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Cannot bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "adserver listening");

    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// Run one control-loop cycle and print the summary as JSON
pub async fn control_run(config: &Config, seed: Option<&Path>) -> Result<()> {
    let (_, control) = build_runtime(config, seed)?;
    let summary = control.run_cycle(Utc::now()).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.display());
    Ok(())
}
