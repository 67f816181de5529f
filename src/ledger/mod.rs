//! Budget ledger
//!
//! Per-advertiser remaining balance, the one resource shared between the
//! auction fast path and everything else. Debits go through a bounded
//! compare-and-set loop so concurrent auctions against the same advertiser
//! can never overspend; each advertiser's balance is an independent unit
//! of contention, so there is no cross-advertiser locking.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One advertiser's budget row
struct BudgetEntry {
    /// Remaining balance in cents; never goes below zero
    balance_cents: AtomicU64,
}

/// Outcome of a debit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Balance reduced by the full charge
    Debited { remaining_cents: u64 },
    /// Balance was below the charge at read time; nothing changed
    Insufficient { balance_cents: u64 },
    /// Compare-and-set lost to concurrent debits on every attempt;
    /// nothing changed, caller decides whether to re-select
    Contended,
    /// No budget row for this advertiser
    UnknownAdvertiser,
}

/// Arena of advertiser balances keyed by advertiser id
pub struct BudgetLedger {
    entries: DashMap<String, BudgetEntry>,
    max_attempts: u32,
}

impl BudgetLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            entries: DashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create or reset an advertiser's budget row
    pub fn insert(&self, advertiser_id: &str, balance_cents: u64) {
        self.entries.insert(
            advertiser_id.to_string(),
            BudgetEntry {
                balance_cents: AtomicU64::new(balance_cents),
            },
        );
    }

    /// Current balance, if the advertiser has a budget row
    pub fn balance(&self, advertiser_id: &str) -> Option<u64> {
        self.entries
            .get(advertiser_id)
            .map(|e| e.balance_cents.load(Ordering::Acquire))
    }

    /// Atomically debit `charge_cents` if the balance still covers it.
    ///
    /// Read-check-write as a single compare-and-set: a stale read loses
    /// the exchange and is retried against the fresh value, up to the
    /// bounded attempt count. The balance can only shrink here, so an
    /// `Insufficient` observation is final for this charge.
    pub fn try_debit(&self, advertiser_id: &str, charge_cents: u64) -> DebitOutcome {
        let entry = match self.entries.get(advertiser_id) {
            Some(e) => e,
            None => return DebitOutcome::UnknownAdvertiser,
        };

        let mut current = entry.balance_cents.load(Ordering::Acquire);
        for _ in 0..self.max_attempts {
            if current < charge_cents {
                return DebitOutcome::Insufficient {
                    balance_cents: current,
                };
            }

            match entry.balance_cents.compare_exchange(
                current,
                current - charge_cents,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(
                        advertiser_id,
                        charge_cents,
                        remaining_cents = current - charge_cents,
                        "budget debited"
                    );
                    return DebitOutcome::Debited {
                        remaining_cents: current - charge_cents,
                    };
                }
                Err(observed) => current = observed,
            }
        }

        DebitOutcome::Contended
    }

    /// Credit an advertiser (external top-up, or the engine's
    /// compensating refund when the audit write fails after a debit)
    pub fn credit(&self, advertiser_id: &str, amount_cents: u64) -> Option<u64> {
        self.entries.get(advertiser_id).map(|e| {
            let previous = e.balance_cents.fetch_add(amount_cents, Ordering::AcqRel);
            previous + amount_cents
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_debit_reduces_balance() {
        let ledger = BudgetLedger::new(8);
        ledger.insert("adv_1", 1000);

        let outcome = ledger.try_debit("adv_1", 300);
        assert_eq!(outcome, DebitOutcome::Debited { remaining_cents: 700 });
        assert_eq!(ledger.balance("adv_1"), Some(700));
    }

    #[test]
    fn test_insufficient_balance_leaves_row_untouched() {
        let ledger = BudgetLedger::new(8);
        ledger.insert("adv_1", 500);

        let outcome = ledger.try_debit("adv_1", 800);
        assert_eq!(outcome, DebitOutcome::Insufficient { balance_cents: 500 });
        assert_eq!(ledger.balance("adv_1"), Some(500));
    }

    #[test]
    fn test_unknown_advertiser() {
        let ledger = BudgetLedger::new(8);
        assert_eq!(ledger.try_debit("ghost", 100), DebitOutcome::UnknownAdvertiser);
    }

    #[test]
    fn test_exact_balance_debits_to_zero() {
        let ledger = BudgetLedger::new(8);
        ledger.insert("adv_1", 500);

        let outcome = ledger.try_debit("adv_1", 500);
        assert_eq!(outcome, DebitOutcome::Debited { remaining_cents: 0 });
        assert_eq!(ledger.balance("adv_1"), Some(0));
    }

    #[test]
    fn test_credit_after_failed_audit_restores_balance() {
        let ledger = BudgetLedger::new(8);
        ledger.insert("adv_1", 1000);

        ledger.try_debit("adv_1", 400);
        assert_eq!(ledger.credit("adv_1", 400), Some(1000));
        assert_eq!(ledger.balance("adv_1"), Some(1000));
    }

    /// Concurrent-wins stress: many debits that would collectively
    /// overspend one advertiser must never drive the balance negative,
    /// and the sum of successful charges must fit the initial balance.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_debits_never_overspend() {
        let ledger = Arc::new(BudgetLedger::new(64));
        let initial: u64 = 1_000;
        let charge: u64 = 90;
        ledger.insert("adv_1", initial);

        let mut handles = Vec::new();
        for _ in 0..40 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.try_debit("adv_1", charge)
            }));
        }

        let mut total_charged: u64 = 0;
        for handle in handles {
            if let DebitOutcome::Debited { .. } = handle.await.unwrap() {
                total_charged += charge;
            }
        }

        let final_balance = ledger.balance("adv_1").unwrap();
        assert!(total_charged <= initial);
        assert_eq!(final_balance, initial - total_charged);
        // 40 x 90 = 3600 cents demanded against 1000: exactly 11 wins fit
        assert_eq!(total_charged, 990);
    }
}
