// Release Watch - Core Library
// Samples a theater listing, diffs it against the ledger of what was already
// announced, and batches only the new items into outbound messages.

pub mod listing;
pub mod identity;
pub mod ledger;
pub mod diff;
pub mod retention;
pub mod batcher;
pub mod delivery;
pub mod config;
pub mod cycle;

// Re-export commonly used types
pub use listing::{Listing, ListingGroup, ListingSource, RawItem, SnapshotSource};
pub use identity::{
    CategoryKeyed, CodeKeyed, Grouping, IdentityStrategy, Item, ItemKey, LedgerLayout,
    NormalizedGroup, StrategyKind,
    get_strategy, slugify_title, code_link, escape_brackets,
};
pub use ledger::{Ledger, LedgerEntry, LedgerError, LedgerStore};
pub use diff::{DiffEngine, DiffStats, NewGroup, NewItems, NEW_GROUPING_MARK};
pub use retention::{RetentionSweeper, SweepReport, DEFAULT_RETENTION_DAYS};
pub use batcher::{BatchPolicy, Batcher, Boundary, render_item};
pub use delivery::{ConsoleNotifier, DeliveryError, Notifier, TelegramNotifier, deliver_all};
pub use config::{TelegramConfig, WatchConfig};
pub use cycle::{Cycle, CycleReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
