// 🪪 Identity & Normalization - Stable keys and display forms for fetched items
//
// Two strategies, one contract:
// - Category-keyed: identity = (category, title, link)
// - Code-keyed:     identity = vendor master code, link synthesized for display only
//
// Normalization is pure: the same Listing always yields the same keys and links.

use crate::listing::{Listing, RawItem};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Presentation format for the time of a showing
pub const SHOWTIME_FORMAT: &str = "%H:%M";

/// Presentation format for the date of a showing
pub const SHOWDATE_FORMAT: &str = "%Y-%m-%d";

/// Characters dropped from a title before it becomes a link slug
const SLUG_STRIPPED: &[char] = &[':', '&', ',', '.', '(', ')', '/', '\'', '!', '[', ']'];

// ============================================================================
// CORE TYPES
// ============================================================================

/// Grouping - Scope in which item keys must be unique
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grouping {
    /// A listing category ("Now Playing")
    Named(String),

    /// Keys are already global (vendor codes), no category scope
    Global,
}

impl Grouping {
    pub fn named(name: &str) -> Self {
        Grouping::Named(name.to_string())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Grouping::Named(name) => Some(name),
            Grouping::Global => None,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Named(name) => write!(f, "{}", name),
            Grouping::Global => write!(f, "(global)"),
        }
    }
}

/// ItemKey - What makes two observations "the same item"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Title + link, scoped by the surrounding grouping
    Composite { title: String, link: String },

    /// Opaque vendor master code
    Code(String),
}

/// Item - A normalized, display-ready observation
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: ItemKey,
    pub title: String,
    pub link: String,

    /// Earliest known showing, when the source reports one
    pub showing: Option<NaiveDateTime>,
}

impl Item {
    pub fn showtime(&self) -> Option<String> {
        self.showing.map(|s| s.format(SHOWTIME_FORMAT).to_string())
    }

    pub fn showdate(&self) -> Option<String> {
        self.showing.map(|s| s.format(SHOWDATE_FORMAT).to_string())
    }
}

/// NormalizedGroup - Items of one grouping, source order, keys unique
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGroup {
    pub grouping: Grouping,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Category,
    Code,
}

impl StrategyKind {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Category => "category-keyed",
            StrategyKind::Code => "code-keyed",
        }
    }
}

/// LedgerLayout - On-disk shape that matches a strategy's keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerLayout {
    /// `{ "<category>": [entry, ...] }`
    Grouped,

    /// `{ "<code>": entry }`
    Flat,
}

// ============================================================================
// STRATEGY TRAIT
// ============================================================================

/// IdentityStrategy - Turns a raw Listing into keyed, normalized groups
pub trait IdentityStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn layout(&self) -> LedgerLayout;

    fn normalize_listing(&self, listing: &Listing) -> Vec<NormalizedGroup>;
}

/// Get the strategy for a configured kind
pub fn get_strategy(kind: StrategyKind, site_prefix: &str) -> Box<dyn IdentityStrategy> {
    match kind {
        StrategyKind::Category => Box::new(CategoryKeyed::new(site_prefix)),
        StrategyKind::Code => Box::new(CodeKeyed::new(site_prefix)),
    }
}

// ============================================================================
// CATEGORY-KEYED
// ============================================================================

pub struct CategoryKeyed {
    site_prefix: String,
}

impl CategoryKeyed {
    pub fn new(site_prefix: &str) -> Self {
        CategoryKeyed {
            site_prefix: site_prefix.trim_end_matches('/').to_string(),
        }
    }

    fn normalize_item(&self, raw: &RawItem) -> Item {
        let title = escape_brackets(raw.title.trim());
        let link = join_link(&self.site_prefix, raw.link.trim());
        Item {
            key: ItemKey::Composite {
                title: title.clone(),
                link: link.clone(),
            },
            title,
            link,
            showing: raw.starts_at,
        }
    }
}

impl IdentityStrategy for CategoryKeyed {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Category
    }

    fn layout(&self) -> LedgerLayout {
        LedgerLayout::Grouped
    }

    fn normalize_listing(&self, listing: &Listing) -> Vec<NormalizedGroup> {
        listing
            .groups
            .iter()
            .map(|group| {
                let mut items: Vec<Item> = Vec::with_capacity(group.items.len());
                for raw in &group.items {
                    let item = self.normalize_item(raw);
                    if items.iter().any(|seen| seen.key == item.key) {
                        debug!(category = %group.name, title = %item.title, "duplicate item in category");
                        continue;
                    }
                    items.push(item);
                }
                NormalizedGroup {
                    grouping: Grouping::Named(group.name.trim().to_string()),
                    items,
                }
            })
            .collect()
    }
}

// ============================================================================
// CODE-KEYED
// ============================================================================

pub struct CodeKeyed {
    site_prefix: String,
}

impl CodeKeyed {
    pub fn new(site_prefix: &str) -> Self {
        CodeKeyed {
            site_prefix: site_prefix.trim_end_matches('/').to_string(),
        }
    }
}

impl IdentityStrategy for CodeKeyed {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Code
    }

    fn layout(&self) -> LedgerLayout {
        LedgerLayout::Flat
    }

    /// Folds every group (date page, session list) into one global grouping.
    /// First sighting of a code fixes its position; the earliest showing wins.
    fn normalize_listing(&self, listing: &Listing) -> Vec<NormalizedGroup> {
        let mut items: Vec<Item> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();

        for raw in listing.groups.iter().flat_map(|g| g.items.iter()) {
            let code = match raw.code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => {
                    debug!(title = %raw.title, "item without master code dropped");
                    continue;
                }
            };

            if let Some(&index) = position.get(&code) {
                let existing = &mut items[index];
                existing.showing = earliest(existing.showing, raw.starts_at);
                continue;
            }

            let title = escape_brackets(raw.title.trim());
            let link = code_link(&self.site_prefix, &title, &code);
            position.insert(code.clone(), items.len());
            items.push(Item {
                key: ItemKey::Code(code),
                title,
                link,
                showing: raw.starts_at,
            });
        }

        if items.is_empty() {
            return Vec::new();
        }

        vec![NormalizedGroup {
            grouping: Grouping::Global,
            items,
        }]
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Earlier of two optional showings; a known showing beats an unknown one
pub fn earliest(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Option<NaiveDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Brackets would break Markdown link syntax
pub fn escape_brackets(title: &str) -> String {
    title.replace('[', "(").replace(']', ")")
}

fn join_link(prefix: &str, link: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if link.starts_with('/') {
        format!("{}{}", prefix, link)
    } else {
        format!("{}/{}", prefix, link)
    }
}

/// Lower-cased, punctuation-free, hyphen-joined form of a title
pub fn slugify_title(title: &str) -> String {
    let stripped: String = title
        .to_lowercase()
        .chars()
        .filter(|c| !SLUG_STRIPPED.contains(c))
        .collect();

    let mut slug = String::with_capacity(stripped.len());
    for c in stripped.split_whitespace().collect::<Vec<_>>().join("-").chars() {
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    slug.trim_matches('-').to_string()
}

/// Display link for a coded item: `{prefix}/movies/{slug}-{code}`
pub fn code_link(prefix: &str, title: &str, code: &str) -> String {
    let slug = slugify_title(title);
    let code = code.to_lowercase();
    if slug.is_empty() {
        format!("{}/movies/{}", prefix, code)
    } else {
        format!("{}/movies/{}-{}", prefix, slug, code)
    }
}

// ============================================================================
// TESTS
// ============================================================================
