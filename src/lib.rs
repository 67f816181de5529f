//! Ad Auction & Budget-Pacing Engine
//!
//! Real-time resource allocation for the marketplace ad inventory: a
//! synchronous per-request auction plus a periodic control loop that keeps
//! delivery pacing smooth and advertiser trust honest against fraud.

pub mod auction;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod ledger;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
