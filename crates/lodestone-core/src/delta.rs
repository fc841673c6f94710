//! Pure delta and message composition for the reconnect report.
//!
//! Nothing here touches the store or a collaborator; [`crate::feed`] feeds
//! it the live counters, the persisted baseline and the retained feed.

use lodestone_types::{AnnouncementId, AnnouncementItem, ItemCount, LiveStats};
use rust_decimal::{Decimal, RoundingStrategy};

/// Label used for exactly one item sold.
pub const ITEM_LABEL_SINGULAR: &str = "Market Item";

/// Label used for any other item count, zero included.
pub const ITEM_LABEL_PLURAL: &str = "Market Items";

/// Growth of the counters since the baseline. Never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Items sold since the baseline.
    pub items: ItemCount,
    /// Money earned since the baseline.
    pub money: Decimal,
}

/// Subtract `baseline` from `live`, clamping each counter at zero.
///
/// A baseline ahead of the live value (an external counter reset) reads as
/// no progress rather than a negative figure.
pub fn compute_delta(live: &LiveStats, baseline: &LiveStats) -> Delta {
    Delta {
        items: live.items_sold.since(&baseline.items_sold),
        money: clamped_sub(live.money_earned, baseline.money_earned),
    }
}

fn clamped_sub(live: Decimal, baseline: Decimal) -> Decimal {
    live.checked_sub(baseline)
        .filter(|d| *d > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO)
}

/// Item label for `count`, singular at exactly one.
pub fn item_label(count: &ItemCount) -> &'static str {
    if count.is_one() {
        ITEM_LABEL_SINGULAR
    } else {
        ITEM_LABEL_PLURAL
    }
}

/// The fixed first line of every reconnect report.
pub fn summary_line(delta: &Delta) -> String {
    let money = delta
        .money
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!(
        "While you were away: {} {} sold, ${money:.2} earned.",
        delta.items,
        item_label(&delta.items)
    )
}

/// One announcement as shown to an actor, both on reconnect and live.
pub fn announcement_line(message: &str) -> String {
    format!("[Announcement] {message}")
}

/// Announcements newer than `last_seen`, in feed order.
pub fn unseen(feed: &[AnnouncementItem], last_seen: AnnouncementId) -> Vec<&AnnouncementItem> {
    feed.iter().filter(|item| item.id > last_seen).collect()
}

/// A composed reconnect report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Lines to deliver, summary first.
    pub lines: Vec<String>,
    /// How many announcements were unseen.
    pub unseen: usize,
    /// How many of those made it into `lines`.
    pub shown: usize,
    /// The last-seen id to persist once `lines` are delivered.
    pub last_seen: AnnouncementId,
}

impl Report {
    /// Unseen announcements left out by the line budget.
    pub const fn omitted(&self) -> usize {
        self.unseen.saturating_sub(self.shown)
    }
}

/// Build the report: the summary line, then as many unseen announcements
/// as fit in `line_budget` lines total.
///
/// `feed` must be oldest-first. Shown announcements are therefore the
/// oldest unseen ones, and the returned last-seen id only moves up to the
/// newest of those; anything cut by the budget is still unseen next time.
pub fn compose(
    delta: &Delta,
    feed: &[AnnouncementItem],
    last_seen: AnnouncementId,
    line_budget: u32,
) -> Report {
    let pending = unseen(feed, last_seen);
    let room = usize::try_from(line_budget.saturating_sub(1)).unwrap_or(usize::MAX);
    let shown: Vec<&AnnouncementItem> = pending.iter().copied().take(room).collect();

    let mut lines = Vec::with_capacity(shown.len().saturating_add(1));
    lines.push(summary_line(delta));
    lines.extend(shown.iter().map(|item| announcement_line(&item.message)));

    let advanced = shown
        .iter()
        .map(|item| item.id)
        .max()
        .map_or(last_seen, |newest| newest.max(last_seen));

    Report {
        lines,
        unseen: pending.len(),
        shown: shown.len(),
        last_seen: advanced,
    }
}
