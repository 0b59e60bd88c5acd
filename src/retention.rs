// 🧹 Retention Sweeper - Bounded-age eviction of stale Ledger entries
// Runs every cycle after the diff, new items or not, so the Ledger cannot grow forever.

use crate::ledger::Ledger;
use chrono::NaiveDate;
use tracing::debug;

/// Default retention window (days)
pub const DEFAULT_RETENTION_DAYS: i64 = 60;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub evicted: usize,
    pub groupings_removed: usize,
}

pub struct RetentionSweeper {
    /// Maximum age (days) an entry may reach before eviction
    pub window_days: i64,
}

impl RetentionSweeper {
    pub fn new() -> Self {
        RetentionSweeper {
            window_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_window(window_days: i64) -> Self {
        RetentionSweeper { window_days }
    }

    /// Entries exactly `window_days` old survive; one day older are evicted.
    /// Groupings left empty are removed.
    pub fn sweep(&self, ledger: &mut Ledger, today: NaiveDate) -> SweepReport {
        let mut report = SweepReport::default();

        ledger.groups_mut().retain(|grouping, entries| {
            let before = entries.len();
            entries.retain(|e| e.age_days(today) <= self.window_days);

            let evicted = before - entries.len();
            if evicted > 0 {
                debug!(%grouping, evicted, "evicted stale entries");
            }
            report.evicted += evicted;

            if entries.is_empty() {
                report.groupings_removed += 1;
                return false;
            }
            true
        });

        report
    }
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Grouping, ItemKey};
    use crate::ledger::LedgerEntry;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn entry(title: &str, age: i64) -> LedgerEntry {
        LedgerEntry {
            key: ItemKey::Code(title.to_string()),
            title: title.to_string(),
            link: format!("/{}", title),
            last_seen: today() - Duration::days(age),
            showing: None,
        }
    }

    #[test]
    fn test_retention_boundary() {
        let mut ledger = Ledger::new();
        ledger.insert_entry(Grouping::named("Now Playing"), entry("kept", 60));
        ledger.insert_entry(Grouping::named("Now Playing"), entry("evicted", 61));

        let report = RetentionSweeper::new().sweep(&mut ledger, today());

        assert_eq!(report.evicted, 1);
        assert_eq!(report.groupings_removed, 0);
        let entries = ledger.entries(&Grouping::named("Now Playing")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "kept");
    }

    #[test]
    fn test_last_entry_removes_grouping() {
        let mut ledger = Ledger::new();
        ledger.insert_entry(Grouping::named("Fan Events"), entry("gone", 61));
        ledger.insert_entry(Grouping::named("Now Playing"), entry("fresh", 0));

        let report = RetentionSweeper::new().sweep(&mut ledger, today());

        assert_eq!(report.groupings_removed, 1);
        assert!(!ledger.contains_grouping(&Grouping::named("Fan Events")));
        assert!(ledger.contains_grouping(&Grouping::named("Now Playing")));
    }

    #[test]
    fn test_empty_grouping_removed() {
        let mut ledger = Ledger::new();
        ledger.groups_mut().insert(Grouping::named("Coming Soon"), Vec::new());

        let report = RetentionSweeper::new().sweep(&mut ledger, today());

        assert_eq!(report.evicted, 0);
        assert_eq!(report.groupings_removed, 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_custom_window() {
        let mut ledger = Ledger::new();
        ledger.insert_entry(Grouping::Global, entry("a", 7));
        ledger.insert_entry(Grouping::Global, entry("b", 8));

        let report = RetentionSweeper::with_window(7).sweep(&mut ledger, today());

        assert_eq!(report.evicted, 1);
        assert_eq!(ledger.entry_count(), 1);
    }
}
