// 🎟️ Listing Input - What one fetch hands to the engine
// Ordered groupings of raw items, plus the trait every fetch adapter implements.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// RawItem - One listed entity exactly as the fetch layer produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Human title as scraped / returned by the vendor
    pub title: String,

    /// Relative path ("/movies/dune-part-two") or absolute URL
    #[serde(default)]
    pub link: String,

    /// Vendor master code (code-keyed sources only)
    #[serde(default)]
    pub code: Option<String>,

    /// Start of one showing, when the source knows it
    #[serde(default)]
    pub starts_at: Option<NaiveDateTime>,
}

impl RawItem {
    pub fn new(title: &str, link: &str) -> Self {
        RawItem {
            title: title.to_string(),
            link: link.to_string(),
            code: None,
            starts_at: None,
        }
    }

    /// Builder pattern: add vendor code
    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    /// Builder pattern: add showing start
    pub fn with_start(mut self, starts_at: NaiveDateTime) -> Self {
        self.starts_at = Some(starts_at);
        self
    }
}

/// ListingGroup - A named bucket of items, in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingGroup {
    pub name: String,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl ListingGroup {
    pub fn new(name: &str, items: Vec<RawItem>) -> Self {
        ListingGroup {
            name: name.to_string(),
            items,
        }
    }
}

/// Listing - The full result of one fetch, groupings in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Listing {
    pub groups: Vec<ListingGroup>,
}

impl Listing {
    pub fn new(groups: Vec<ListingGroup>) -> Self {
        Listing { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total raw items across all groups
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// ListingSource - Anything that can produce a Listing for this cycle
///
/// Scraping and vendor API walks live outside the crate; they only need to
/// hand back groupings in source order.
pub trait ListingSource: Send + Sync {
    fn fetch(&self) -> Result<Listing>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// SnapshotSource - Reads a JSON snapshot written by an external fetcher
///
/// Expected shape: `[{"name": "...", "items": [{"title": "...", "link": "..."}]}]`.
/// A group that does not deserialize is skipped; the rest of the cycle goes on.
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SnapshotSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ListingSource for SnapshotSource {
    fn fetch(&self) -> Result<Listing> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read listing snapshot: {:?}", self.path))?;

        let raw_groups: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Listing snapshot is not a JSON array: {:?}", self.path))?;

        let mut groups = Vec::with_capacity(raw_groups.len());
        for (index, value) in raw_groups.into_iter().enumerate() {
            match serde_json::from_value::<ListingGroup>(value) {
                Ok(group) => groups.push(group),
                Err(err) => warn!(index, error = %err, "skipping unparsable listing group"),
            }
        }

        debug!(source = self.name(), groups = groups.len(), "listing loaded");
        Ok(Listing::new(groups))
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

// ============================================================================
// TESTS
// ============================================================================
