//! Retention sweeper
//!
//! Purges raw traffic events past the retention window. Aggregates the
//! auction consumes (trust rows, quality scores, pacing records) are
//! recomputed from the surviving window, so the purge never rewrites them.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::store::AdStore;

pub struct RetentionSweeper {
    store: Arc<dyn AdStore>,
    retention_days: i64,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn AdStore>, retention_days: i64) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    /// Delete events older than the retention window; returns rows deleted
    pub async fn run(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - Duration::days(self.retention_days);
        let deleted = self.store.purge_events_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, retention_days = self.retention_days, "traffic events purged");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BudgetLedger;
    use crate::store::{MemoryStore, TrafficEvent, TrafficEventKind};

    #[tokio::test]
    async fn test_sweep_removes_only_expired_events() {
        let ledger = Arc::new(BudgetLedger::new(8));
        let store = Arc::new(MemoryStore::new(ledger));
        let now = Utc::now();

        for (i, age_days) in [(0u32, 5i64), (1, 29), (2, 31), (3, 400)] {
            store.add_event(TrafficEvent {
                event_id: format!("ev_{}", i),
                advertiser_id: "adv_a".to_string(),
                creative_id: "cr_1".to_string(),
                kind: TrafficEventKind::Impression,
                source: "10.0.0.1".to_string(),
                is_valid: true,
                occurred_at: now - Duration::days(age_days),
            });
        }

        let sweeper = RetentionSweeper::new(store.clone(), 30);
        assert_eq!(sweeper.run(now).await.unwrap(), 2);
        assert_eq!(store.event_count(), 2);

        // A second sweep with no new events is a no-op
        assert_eq!(sweeper.run(now).await.unwrap(), 0);
    }
}
