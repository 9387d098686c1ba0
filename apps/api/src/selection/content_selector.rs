//! Content selector: blends due reviews and unseen content into one study list.
//!
//! Pure functions over rows already fetched by `selection::queries`; no I/O here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::deck::Content;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Review,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub kind: ItemKind,
    pub content: Content,
}

/// A content row whose memory state is due, with the strength it is ranked by.
#[derive(Debug, Clone, FromRow)]
pub struct DueReview {
    #[sqlx(flatten)]
    pub content: Content,
    pub memory_strength: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Selection algorithm
// ────────────────────────────────────────────────────────────────────────────

/// How many new rows to fetch so the window `[offset, offset + target)` is
/// filled whenever the deck has enough content.
pub fn new_content_limit(target: usize, start_offset: usize) -> usize {
    start_offset.saturating_add(target)
}

/// Builds the study list.
///
/// 1. Due reviews, weakest memory first (ties by content id)
/// 2. New content not already among the reviews, in id order
/// 3. Window `[start_offset, start_offset + target)` over the concatenation
pub fn assemble_selection(
    mut due: Vec<DueReview>,
    mut new: Vec<Content>,
    target: usize,
    start_offset: usize,
) -> Vec<SelectedItem> {
    due.sort_by(|a, b| {
        a.memory_strength
            .partial_cmp(&b.memory_strength)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.content.id.cmp(&b.content.id))
    });
    new.sort_by_key(|c| c.id);

    let due_ids: HashSet<i64> = due.iter().map(|d| d.content.id).collect();
    let new_limit = new_content_limit(target, start_offset);

    due.into_iter()
        .map(|d| SelectedItem {
            kind: ItemKind::Review,
            content: d.content,
        })
        .chain(
            new.into_iter()
                .filter(|c| !due_ids.contains(&c.id))
                .take(new_limit)
                .map(|content| SelectedItem {
                    kind: ItemKind::New,
                    content,
                }),
        )
        .skip(start_offset)
        .take(target)
        .collect()
}

/// Legacy session selection: due items (mastered included) then new content
/// up to `target - due`, truncated to `target`. No offset.
pub fn assemble_legacy_selection(
    due: Vec<Content>,
    new: Vec<Content>,
    target: usize,
) -> Vec<SelectedItem> {
    let due_ids: HashSet<i64> = due.iter().map(|c| c.id).collect();
    let room = target.saturating_sub(due.len());

    due.into_iter()
        .map(|content| SelectedItem {
            kind: ItemKind::Review,
            content,
        })
        .chain(
            new.into_iter()
                .filter(|c| !due_ids.contains(&c.id))
                .take(room)
                .map(|content| SelectedItem {
                    kind: ItemKind::New,
                    content,
                }),
        )
        .take(target)
        .collect()
}

/// Appends items from a supplementary pass until `target` is reached,
/// skipping content the list already holds.
pub fn top_up(
    mut items: Vec<SelectedItem>,
    extra: Vec<SelectedItem>,
    target: usize,
) -> Vec<SelectedItem> {
    let mut seen: HashSet<i64> = items.iter().map(|i| i.content.id).collect();
    for item in extra {
        if items.len() >= target {
            break;
        }
        if seen.insert(item.content.id) {
            items.push(item);
        }
    }
    items
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
