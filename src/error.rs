//! Error types for the auction engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the auction engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Auction request errors
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    // Eligibility store errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Duplicate impression record: {0}")]
    DuplicateImpression(String),

    // Budget ledger errors
    #[error("Insufficient budget: advertiser {advertiser_id} has {balance_cents} cents, {charge_cents} cents required")]
    InsufficientBudget {
        advertiser_id: String,
        balance_cents: u64,
        charge_cents: u64,
    },

    #[error("Debit conflict for advertiser {0} after {1} attempts")]
    DebitConflict(String, u32),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_) | Error::DebitConflict(..))
    }

    /// Check if this error is the caller's fault (400-equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidSlot(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::StoreUnavailable("down".into()).is_retryable());
        assert!(Error::DebitConflict("adv_1".into(), 8).is_retryable());
        assert!(!Error::InvalidSlot("slot_1".into()).is_retryable());
        assert!(!Error::InsufficientBudget {
            advertiser_id: "adv_1".into(),
            balance_cents: 500,
            charge_cents: 800,
        }
        .is_retryable());
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::InvalidSlot("slot_1".into()).is_client_error());
        assert!(!Error::StoreUnavailable("down".into()).is_client_error());
        assert!(!Error::Internal("boom".into()).is_client_error());
    }
}
