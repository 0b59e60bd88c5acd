// 🔍 Diff Engine - What is new since the last cycle
//
// Compares the normalized fetch against the Ledger and mutates the Ledger to
// reflect this observation:
// 1. Grouping never seen before  → whole grouping is new, marked "(NEW!)"
// 2. Known grouping, known key   → bump last_seen, earliest showing wins
// 3. Known grouping, unknown key → item is new, appended to the Ledger
//
// Absence from a fetch never removes anything; eviction is the sweeper's job.

use crate::identity::{earliest, Grouping, Item, NormalizedGroup};
use crate::ledger::{Ledger, LedgerEntry};
use chrono::NaiveDate;
use tracing::debug;

/// Suffix appended to the label of a grouping seen for the first time
pub const NEW_GROUPING_MARK: &str = "(NEW!)";

// ============================================================================
// NEW ITEMS
// ============================================================================

/// NewGroup - Unseen items of one grouping, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct NewGroup {
    pub grouping: Grouping,

    /// True when the whole grouping was absent from the Ledger
    pub is_new_grouping: bool,

    pub items: Vec<Item>,
}

impl NewGroup {
    /// Header shown above the items; None for the global grouping
    pub fn label(&self) -> Option<String> {
        let name = self.grouping.name()?;
        if self.is_new_grouping {
            Some(format!("{} {}", name, NEW_GROUPING_MARK))
        } else {
            Some(name.to_string())
        }
    }
}

/// NewItems - Same shape as the fetch, only what was never seen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItems {
    pub groups: Vec<NewGroup>,
}

impl NewItems {
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

// ============================================================================
// DIFF ENGINE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffStats {
    pub new_groupings: usize,
    pub new_items: usize,
    pub refreshed: usize,
}

pub struct DiffEngine {
    /// Cycle date stamped on every observation
    today: NaiveDate,
}

impl DiffEngine {
    pub fn new(today: NaiveDate) -> Self {
        DiffEngine { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Compute new items and record this observation in the Ledger
    pub fn diff(&self, current: &[NormalizedGroup], ledger: &mut Ledger) -> (NewItems, DiffStats) {
        let mut new_items = NewItems::default();
        let mut stats = DiffStats::default();

        for group in current {
            if !ledger.contains_grouping(&group.grouping) {
                self.seed_grouping(group, ledger, &mut new_items, &mut stats);
                continue;
            }

            let mut fresh = Vec::new();
            let entries = ledger
                .groups_mut()
                .entry(group.grouping.clone())
                .or_default();

            for item in &group.items {
                match entries.iter_mut().find(|e| e.key == item.key) {
                    Some(entry) => {
                        entry.last_seen = entry.last_seen.max(self.today);
                        entry.showing = earliest(entry.showing, item.showing);
                        stats.refreshed += 1;
                    }
                    None => {
                        debug!(grouping = %group.grouping, title = %item.title, "new item");
                        entries.push(LedgerEntry::observed(item, self.today));
                        fresh.push(item.clone());
                    }
                }
            }

            if !fresh.is_empty() {
                stats.new_items += fresh.len();
                new_items.groups.push(NewGroup {
                    grouping: group.grouping.clone(),
                    is_new_grouping: false,
                    items: fresh,
                });
            }
        }

        (new_items, stats)
    }

    fn seed_grouping(
        &self,
        group: &NormalizedGroup,
        ledger: &mut Ledger,
        new_items: &mut NewItems,
        stats: &mut DiffStats,
    ) {
        debug!(grouping = %group.grouping, items = group.items.len(), "new grouping");

        let entries = ledger.groups_mut().entry(group.grouping.clone()).or_default();
        entries.extend(group.items.iter().map(|item| LedgerEntry::observed(item, self.today)));

        stats.new_groupings += 1;
        stats.new_items += group.items.len();

        // Seeded either way; an empty grouping has nothing to announce
        if group.items.is_empty() {
            return;
        }
        new_items.groups.push(NewGroup {
            grouping: group.grouping.clone(),
            is_new_grouping: group.grouping != Grouping::Global,
            items: group.items.clone(),
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================
