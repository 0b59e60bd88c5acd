// 📒 Ledger - Durable record of everything already announced
//
// The Ledger is the single source of truth for "have we seen this before".
// The store only loads and saves it: full read, full rewrite, no merging.

use crate::identity::{Grouping, Item, ItemKey, LedgerLayout, SHOWDATE_FORMAT, SHOWTIME_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The file exists but could not be read or written
    #[error("ledger I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Persisted content is malformed; never repaired automatically
    #[error("ledger at {path:?} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

// ============================================================================
// MODEL
// ============================================================================

/// LedgerEntry - One previously observed item
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub key: ItemKey,
    pub title: String,
    pub link: String,

    /// Last cycle date the item was observed
    pub last_seen: NaiveDate,

    /// Earliest known showing
    pub showing: Option<NaiveDateTime>,
}

impl LedgerEntry {
    /// Seed an entry from a first observation
    pub fn observed(item: &Item, today: NaiveDate) -> Self {
        LedgerEntry {
            key: item.key.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            last_seen: today,
            showing: item.showing,
        }
    }

    /// Days since the entry was last observed
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.last_seen).num_days()
    }
}

/// Ledger - Grouping → entries, keys unique within a grouping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    groups: BTreeMap<Grouping, Vec<LedgerEntry>>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    pub fn contains_grouping(&self, grouping: &Grouping) -> bool {
        self.groups.contains_key(grouping)
    }

    pub fn entries(&self, grouping: &Grouping) -> Option<&[LedgerEntry]> {
        self.groups.get(grouping).map(Vec::as_slice)
    }

    /// Find an entry by key inside one grouping
    pub fn find(&self, grouping: &Grouping, key: &ItemKey) -> Option<&LedgerEntry> {
        self.groups.get(grouping)?.iter().find(|e| &e.key == key)
    }

    pub fn groupings(&self) -> impl Iterator<Item = &Grouping> {
        self.groups.keys()
    }

    pub fn grouping_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn groups_mut(&mut self) -> &mut BTreeMap<Grouping, Vec<LedgerEntry>> {
        &mut self.groups
    }

    pub(crate) fn insert_entry(&mut self, grouping: Grouping, entry: LedgerEntry) {
        self.groups.entry(grouping).or_default().push(entry);
    }
}

// ============================================================================
// PERSISTED RECORDS
// ============================================================================

/// Category-keyed record: `{"title", "link", "last_seen"}` (+ showing if known)
#[derive(Debug, Serialize, Deserialize)]
struct GroupedRecord {
    title: String,
    link: String,
    last_seen: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    showtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    showdate: Option<String>,
}

/// Code-keyed record: `{"title", "link", "showtime", "showdate", "last_seen"}`
#[derive(Debug, Serialize, Deserialize)]
struct FlatRecord {
    title: String,
    link: String,
    #[serde(default)]
    showtime: String,
    #[serde(default)]
    showdate: String,
    last_seen: NaiveDate,
}

fn split_showing(showing: Option<NaiveDateTime>) -> (Option<String>, Option<String>) {
    match showing {
        Some(s) => (
            Some(s.format(SHOWTIME_FORMAT).to_string()),
            Some(s.format(SHOWDATE_FORMAT).to_string()),
        ),
        None => (None, None),
    }
}

fn join_showing(showtime: Option<&str>, showdate: Option<&str>) -> Result<Option<NaiveDateTime>, String> {
    match (showtime, showdate) {
        (Some(time), Some(date)) if !time.is_empty() && !date.is_empty() => {
            let time = NaiveTime::parse_from_str(time, SHOWTIME_FORMAT)
                .map_err(|e| format!("bad showtime {:?}: {}", time, e))?;
            let date = NaiveDate::parse_from_str(date, SHOWDATE_FORMAT)
                .map_err(|e| format!("bad showdate {:?}: {}", date, e))?;
            Ok(Some(date.and_time(time)))
        }
        _ => Ok(None),
    }
}

// ============================================================================
// STORE
// ============================================================================

/// LedgerStore - Loads and persists the Ledger as JSON
pub struct LedgerStore {
    path: PathBuf,
    layout: LedgerLayout,
}

impl LedgerStore {
    pub fn new<P: AsRef<Path>>(path: P, layout: LedgerLayout) -> Self {
        LedgerStore {
            path: path.as_ref().to_path_buf(),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent file means first run: empty Ledger
    pub fn load(&self) -> Result<Ledger, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no ledger yet, starting empty");
                return Ok(Ledger::new());
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let ledger = match self.layout {
            LedgerLayout::Grouped => self.decode_grouped(&content),
            LedgerLayout::Flat => self.decode_flat(&content),
        }
        .map_err(|reason| LedgerError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;

        debug!(
            path = ?self.path,
            groupings = ledger.grouping_count(),
            entries = ledger.entry_count(),
            "ledger loaded"
        );
        Ok(ledger)
    }

    /// Overwrites prior content with the full Ledger
    pub fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let json = match self.layout {
            LedgerLayout::Grouped => serde_json::to_string_pretty(&encode_grouped(ledger)),
            LedgerLayout::Flat => serde_json::to_string_pretty(&encode_flat(ledger)),
        }
        .map_err(|e| LedgerError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = ?self.path, entries = ledger.entry_count(), "ledger saved");
        Ok(())
    }

    fn decode_grouped(&self, content: &str) -> Result<Ledger, String> {
        let records: BTreeMap<String, Vec<GroupedRecord>> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut ledger = Ledger::new();
        for (category, entries) in records {
            let grouping = Grouping::Named(category);
            let slot = ledger.groups_mut().entry(grouping).or_default();
            for record in entries {
                let showing = join_showing(record.showtime.as_deref(), record.showdate.as_deref())?;
                slot.push(LedgerEntry {
                    key: ItemKey::Composite {
                        title: record.title.clone(),
                        link: record.link.clone(),
                    },
                    title: record.title,
                    link: record.link,
                    last_seen: record.last_seen,
                    showing,
                });
            }
        }
        Ok(ledger)
    }

    fn decode_flat(&self, content: &str) -> Result<Ledger, String> {
        let records: BTreeMap<String, FlatRecord> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut ledger = Ledger::new();
        for (code, record) in records {
            let showing = join_showing(Some(&record.showtime), Some(&record.showdate))?;
            ledger.insert_entry(
                Grouping::Global,
                LedgerEntry {
                    key: ItemKey::Code(code),
                    title: record.title,
                    link: record.link,
                    last_seen: record.last_seen,
                    showing,
                },
            );
        }
        Ok(ledger)
    }
}

fn encode_grouped(ledger: &Ledger) -> BTreeMap<String, Vec<GroupedRecord>> {
    ledger
        .groups
        .iter()
        .map(|(grouping, entries)| {
            let records = entries
                .iter()
                .map(|e| {
                    let (showtime, showdate) = split_showing(e.showing);
                    GroupedRecord {
                        title: e.title.clone(),
                        link: e.link.clone(),
                        last_seen: e.last_seen,
                        showtime,
                        showdate,
                    }
                })
                .collect();
            (grouping.to_string(), records)
        })
        .collect()
}

fn encode_flat(ledger: &Ledger) -> BTreeMap<String, FlatRecord> {
    ledger
        .groups
        .values()
        .flatten()
        .map(|e| {
            let code = match &e.key {
                ItemKey::Code(code) => code.clone(),
                ItemKey::Composite { link, .. } => link.clone(),
            };
            let (showtime, showdate) = split_showing(e.showing);
            let record = FlatRecord {
                title: e.title.clone(),
                link: e.link.clone(),
                showtime: showtime.unwrap_or_default(),
                showdate: showdate.unwrap_or_default(),
                last_seen: e.last_seen,
            };
            (code, record)
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
