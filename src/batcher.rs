// 📦 Notification Batcher - New items → ordered message bodies under a ceiling
//
// Two boundary policies:
// - BeforeOverflow: close the message before a grouping that would overflow it
// - ExactMultiple:  close the message after every Nth item
// Either way no message ever holds more than `ceiling` items.

use crate::diff::{NewGroup, NewItems};
use crate::identity::{escape_brackets, Item, StrategyKind};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// Keep groupings whole when they fit; split only groupings larger than a message
    BeforeOverflow,

    /// Cut after every `ceiling`-th item, wherever it falls
    ExactMultiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub ceiling: usize,
    pub boundary: Boundary,
}

impl BatchPolicy {
    pub fn new(ceiling: usize, boundary: Boundary) -> Result<Self> {
        if ceiling == 0 {
            bail!("batch ceiling must be at least 1");
        }
        Ok(BatchPolicy { ceiling, boundary })
    }

    /// Defaults per identity strategy: 100 per message for categories, 30 for codes
    pub fn for_strategy(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Category => BatchPolicy {
                ceiling: 100,
                boundary: Boundary::BeforeOverflow,
            },
            StrategyKind::Code => BatchPolicy {
                ceiling: 30,
                boundary: Boundary::ExactMultiple,
            },
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Markdown line for one item: `[title](link)` plus the showing when known
pub fn render_item(item: &Item) -> String {
    let mut line = format!("[{}]({})", escape_brackets(&item.title), item.link);
    if let (Some(date), Some(time)) = (item.showdate(), item.showtime()) {
        line.push_str(&format!(" - {} {}", date, time));
    }
    line
}

#[derive(Default)]
struct MessageBuilder {
    body: String,
    count: usize,
}

impl MessageBuilder {
    fn header(&mut self, label: Option<&str>) {
        if let Some(label) = label {
            if !self.body.is_empty() {
                self.body.push('\n');
            }
            self.body.push_str(&format!("*{}*\n", label));
        }
    }

    fn line(&mut self, item: &Item) {
        self.body.push_str(&render_item(item));
        self.body.push('\n');
        self.count += 1;
    }

    fn flush(&mut self, messages: &mut Vec<String>) {
        if self.count > 0 {
            messages.push(std::mem::take(&mut self.body));
        }
        self.body.clear();
        self.count = 0;
    }
}

// ============================================================================
// BATCHER
// ============================================================================

pub struct Batcher {
    policy: BatchPolicy,
}

impl Batcher {
    pub fn new(policy: BatchPolicy) -> Self {
        Batcher { policy }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Message bodies in discovery order; the trailing partial batch is kept
    pub fn batch(&self, new_items: &NewItems) -> Vec<String> {
        let mut messages = Vec::new();
        let mut current = MessageBuilder::default();

        for group in &new_items.groups {
            if self.closes_before(&current, group) {
                current.flush(&mut messages);
            }

            let label = group.label();
            current.header(label.as_deref());

            for item in &group.items {
                if current.count == self.policy.ceiling {
                    current.flush(&mut messages);
                    current.header(label.as_deref());
                }
                current.line(item);
            }
        }

        current.flush(&mut messages);
        messages
    }

    fn closes_before(&self, current: &MessageBuilder, group: &NewGroup) -> bool {
        if current.count == 0 {
            return false;
        }
        match self.policy.boundary {
            Boundary::BeforeOverflow => current.count + group.items.len() > self.policy.ceiling,
            Boundary::ExactMultiple => current.count == self.policy.ceiling,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Grouping, ItemKey};
    use chrono::NaiveDate;

    fn item(n: usize) -> Item {
        Item {
            key: ItemKey::Code(format!("HO{}", n)),
            title: format!("Film {}", n),
            link: format!("https://regmovies.com/movies/film-{}", n),
            showing: None,
        }
    }

    /// Groups of the given sizes, items numbered 1.. across all groups
    fn new_items(sizes: &[usize]) -> NewItems {
        let mut n = 0;
        let groups = sizes
            .iter()
            .enumerate()
            .map(|(g, size)| NewGroup {
                grouping: Grouping::Named(format!("Category {}", g)),
                is_new_grouping: false,
                items: (0..*size)
                    .map(|_| {
                        n += 1;
                        item(n)
                    })
                    .collect(),
            })
            .collect();
        NewItems { groups }
    }

    fn item_lines(message: &str) -> Vec<&str> {
        message.lines().filter(|l| l.starts_with('[')).collect()
    }

    fn category_batcher() -> Batcher {
        Batcher::new(BatchPolicy::for_strategy(StrategyKind::Category))
    }

    #[test]
    fn test_hundred_items_one_message() {
        let messages = category_batcher().batch(&new_items(&[60, 40]));
        assert_eq!(messages.len(), 1);
        assert_eq!(item_lines(&messages[0]).len(), 100);
    }

    #[test]
    fn test_hundred_and_one_items_two_messages() {
        let messages = category_batcher().batch(&new_items(&[60, 40, 1]));

        assert_eq!(messages.len(), 2);
        assert_eq!(item_lines(&messages[0]).len(), 100);
        assert_eq!(item_lines(&messages[1]), vec!["[Film 101](https://regmovies.com/movies/film-101)"]);
    }

    #[test]
    fn test_oversized_grouping_is_split() {
        let messages = category_batcher().batch(&new_items(&[101]));

        assert_eq!(messages.len(), 2);
        assert_eq!(item_lines(&messages[0]).len(), 100);
        assert_eq!(messages[1], "*Category 0*\n[Film 101](https://regmovies.com/movies/film-101)\n");
    }

    #[test]
    fn test_before_overflow_keeps_groupings_whole() {
        let messages = category_batcher().batch(&new_items(&[60, 41]));

        assert_eq!(messages.len(), 2);
        assert_eq!(item_lines(&messages[0]).len(), 60);
        assert_eq!(item_lines(&messages[1]).len(), 41);
        assert!(messages[1].starts_with("*Category 1*\n[Film 61]"));
    }

    #[test]
    fn test_exact_multiple_cuts_every_nth() {
        let batcher = Batcher::new(BatchPolicy::for_strategy(StrategyKind::Code));
        let messages = batcher.batch(&new_items(&[20, 41]));

        assert_eq!(messages.len(), 3);
        assert_eq!(item_lines(&messages[0]).len(), 30);
        assert_eq!(item_lines(&messages[1]).len(), 30);
        assert_eq!(item_lines(&messages[2]).len(), 1);
        assert!(messages[0].starts_with("*Category 0*\n"));
        assert!(messages[1].starts_with("*Category 1*\n[Film 31]"));
    }

    #[test]
    fn test_order_preserved_across_messages() {
        let batcher = Batcher::new(BatchPolicy::new(3, Boundary::ExactMultiple).unwrap());
        let messages = batcher.batch(&new_items(&[2, 2, 3]));

        let all: Vec<String> = messages
            .iter()
            .flat_map(|m| item_lines(m))
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = (1..=7).map(|n| render_item(&item(n))).collect();
        assert_eq!(all, expected);
        assert!(messages.iter().all(|m| item_lines(m).len() <= 3));
    }

    #[test]
    fn test_empty_input_no_messages() {
        assert!(category_batcher().batch(&NewItems::default()).is_empty());
    }

    #[test]
    fn test_new_grouping_label_and_global_header() {
        let new_items = NewItems {
            groups: vec![
                NewGroup {
                    grouping: Grouping::named("Now Playing"),
                    is_new_grouping: true,
                    items: vec![item(1)],
                },
            ],
        };
        let messages = category_batcher().batch(&new_items);
        assert_eq!(messages[0], "*Now Playing (NEW!)*\n[Film 1](https://regmovies.com/movies/film-1)\n");

        let global = NewItems {
            groups: vec![NewGroup {
                grouping: Grouping::Global,
                is_new_grouping: false,
                items: vec![item(1)],
            }],
        };
        let messages = category_batcher().batch(&global);
        assert_eq!(messages[0], "[Film 1](https://regmovies.com/movies/film-1)\n");
    }

    #[test]
    fn test_render_item_with_showing_and_brackets() {
        let mut film = item(1);
        film.title = "Akira [4K]".to_string();
        film.showing = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(11, 30, 0);

        assert_eq!(
            render_item(&film),
            "[Akira (4K)](https://regmovies.com/movies/film-1) - 2024-03-01 11:30"
        );
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        assert!(BatchPolicy::new(0, Boundary::BeforeOverflow).is_err());
    }
}
