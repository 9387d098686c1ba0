//! Free practice: cycle through a deck in id order, and reschedule single
//! cards with the doubling policy outside any batch or session.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::deck::Content;
use crate::models::memory::MemoryState;
use crate::scheduling::{Feedback, SchedulingPolicy};
use crate::study::config::fetch_deck;
use crate::study::memory::{fetch_content, get_or_create_memory_state, save_memory_state};

/// Prompt direction for practice cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PracticeMode {
    /// Show the front, answer with the back.
    #[default]
    EnToZh,
    /// Show the back, answer with the front.
    ZhToEn,
}

impl FromStr for PracticeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en_to_zh" => Ok(PracticeMode::EnToZh),
            "zh_to_en" => Ok(PracticeMode::ZhToEn),
            other => Err(AppError::Validation(format!(
                "unknown practice mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeCard {
    pub id: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub display_text: String,
    pub answer: String,
    pub example: Option<String>,
}

/// 1-based position of the card within the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PracticeProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PracticeNext {
    pub content: PracticeCard,
    pub progress: PracticeProgress,
}

/// Index of the card after `current`, wrapping at the end. Starts at 0 when
/// there is no current card or it is not in the deck. `None` for an empty deck.
pub fn next_position(ids: &[i64], current: Option<i64>) -> Option<usize> {
    if ids.is_empty() {
        return None;
    }
    let next = current
        .and_then(|id| ids.iter().position(|&c| c == id))
        .map_or(0, |i| (i + 1) % ids.len());
    Some(next)
}

pub fn present_practice(content: Content, mode: PracticeMode) -> PracticeCard {
    let (display_text, answer) = match mode {
        PracticeMode::EnToZh => (content.front, content.back),
        PracticeMode::ZhToEn => (content.back, content.front),
    };
    PracticeCard {
        id: content.id,
        content_type: content.content_type,
        display_text,
        answer,
        example: content.example,
    }
}

/// The card following `current_content_id` in the deck's id order.
pub async fn next_practice_card(
    pool: &PgPool,
    deck_id: i64,
    current_content_id: Option<i64>,
    mode: PracticeMode,
) -> Result<PracticeNext, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_deck(&mut conn, deck_id).await?;

    let mut cards = sqlx::query_as::<_, Content>(
        "SELECT * FROM content WHERE deck_id = $1 ORDER BY id ASC",
    )
    .bind(deck_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<i64> = cards.iter().map(|c| c.id).collect();
    let Some(index) = next_position(&ids, current_content_id) else {
        return Err(AppError::Validation(format!(
            "Deck {deck_id} has no content to practice"
        )));
    };

    let total = cards.len();
    let card = cards.swap_remove(index);
    Ok(PracticeNext {
        content: present_practice(card, mode),
        progress: PracticeProgress {
            current: index + 1,
            total,
        },
    })
}

/// Reschedules one card from a practice answer with the doubling policy.
pub async fn submit_practice_feedback(
    pool: &PgPool,
    content_id: i64,
    feedback: Feedback,
    response_time: i64,
    now: DateTime<Utc>,
) -> Result<MemoryState, AppError> {
    let mut tx = pool.begin().await?;

    fetch_content(&mut tx, content_id).await?;
    let state = get_or_create_memory_state(&mut tx, content_id).await?;
    let next = SchedulingPolicy::Doubling.apply(&state, feedback, response_time, now)?;
    save_memory_state(&mut tx, &next).await?;

    tx.commit().await?;

    info!(
        "Practice feedback '{feedback}' on content {content_id}: interval {}d",
        next.interval_days
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: i64) -> Content {
        Content {
            id,
            deck_id: 2,
            content_type: "phrase".to_string(),
            front: "good morning".to_string(),
            back: "早上好".to_string(),
            example: None,
            unit: Some("3".to_string()),
            page: None,
            sort_order: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_position_cycles() {
        let ids = [4, 9, 12];
        assert_eq!(next_position(&ids, None), Some(0));
        assert_eq!(next_position(&ids, Some(4)), Some(1));
        assert_eq!(next_position(&ids, Some(12)), Some(0));
    }

    #[test]
    fn test_unknown_current_starts_over() {
        assert_eq!(next_position(&[4, 9], Some(77)), Some(0));
        assert_eq!(next_position(&[], Some(4)), None);
    }

    #[test]
    fn test_mode_orients_card() {
        let en = present_practice(card(1), PracticeMode::EnToZh);
        assert_eq!(en.display_text, "good morning");
        assert_eq!(en.answer, "早上好");

        let zh = present_practice(card(1), PracticeMode::ZhToEn);
        assert_eq!(zh.display_text, "早上好");
        assert_eq!(zh.answer, "good morning");
        assert_eq!(zh.content_type, "phrase");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("zh_to_en".parse::<PracticeMode>().unwrap(), PracticeMode::ZhToEn);
        assert!(matches!(
            "sideways".parse::<PracticeMode>(),
            Err(AppError::Validation(_))
        ));
    }
}
