// 🔁 Cycle - One end-to-end run
// fetch → normalize → load ledger → diff → sweep → batch → deliver → save
//
// Save happens only after delivery succeeded. A failed send aborts the cycle
// with the previous ledger still on disk, so the next run may re-announce
// (at-least-once).

use crate::batcher::Batcher;
use crate::config::WatchConfig;
use crate::delivery::{deliver_all, Notifier};
use crate::diff::DiffEngine;
use crate::identity::{get_strategy, IdentityStrategy};
use crate::ledger::LedgerStore;
use crate::listing::ListingSource;
use crate::retention::RetentionSweeper;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub new_items: usize,
    pub new_groupings: usize,
    pub messages_sent: usize,
    pub evicted: usize,
    pub groupings_removed: usize,
}

pub struct Cycle {
    strategy: Box<dyn IdentityStrategy>,
    store: LedgerStore,
    sweeper: RetentionSweeper,
    batcher: Batcher,
}

impl Cycle {
    pub fn new(
        strategy: Box<dyn IdentityStrategy>,
        store: LedgerStore,
        sweeper: RetentionSweeper,
        batcher: Batcher,
    ) -> Self {
        Cycle {
            strategy,
            store,
            sweeper,
            batcher,
        }
    }

    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        let strategy = get_strategy(config.strategy, &config.site_prefix);
        let store = LedgerStore::new(&config.ledger_path, strategy.layout());
        Ok(Cycle::new(
            strategy,
            store,
            RetentionSweeper::with_window(config.retention_days),
            Batcher::new(config.batch_policy()?),
        ))
    }

    pub async fn run(
        &self,
        source: &dyn ListingSource,
        notifier: &dyn Notifier,
        today: NaiveDate,
    ) -> Result<CycleReport> {
        let listing = source
            .fetch()
            .with_context(|| format!("Failed to fetch listing from {}", source.name()))?;
        let current = self.strategy.normalize_listing(&listing);
        info!(
            strategy = self.strategy.kind().name(),
            groupings = current.len(),
            raw_items = listing.item_count(),
            "listing fetched"
        );

        let mut ledger = self.store.load().context("Failed to load ledger")?;

        let (new_items, stats) = DiffEngine::new(today).diff(&current, &mut ledger);
        let sweep = self.sweeper.sweep(&mut ledger, today);
        info!(
            new_items = stats.new_items,
            new_groupings = stats.new_groupings,
            refreshed = stats.refreshed,
            evicted = sweep.evicted,
            groupings_removed = sweep.groupings_removed,
            "ledger updated"
        );

        let messages_sent = if new_items.is_empty() {
            info!("no new items detected");
            0
        } else {
            let messages = self.batcher.batch(&new_items);
            deliver_all(notifier, &messages)
                .await
                .with_context(|| format!("Delivery via {} failed; ledger not saved", notifier.name()))?
        };

        self.store.save(&ledger).context("Failed to save ledger")?;

        Ok(CycleReport {
            new_items: new_items.item_count(),
            new_groupings: stats.new_groupings,
            messages_sent,
            evicted: sweep.evicted,
            groupings_removed: sweep.groupings_removed,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
