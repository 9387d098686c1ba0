use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::UnknownVariant;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 3.0;

/// Strength at which a card reads as too easy to keep drilling.
pub const TOO_EASY_STRENGTH: f64 = 0.7;
/// Strength and review count both required for `Mastered`.
pub const MASTERED_STRENGTH: f64 = 0.9;
pub const MASTERED_MIN_REVIEWS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    New,
    Learning,
    TooEasy,
    Mastered,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::New => "new",
            MemoryStatus::Learning => "learning",
            MemoryStatus::TooEasy => "too_easy",
            MemoryStatus::Mastered => "mastered",
        }
    }
}

impl TryFrom<String> for MemoryStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "new" => Ok(MemoryStatus::New),
            "learning" => Ok(MemoryStatus::Learning),
            "too_easy" => Ok(MemoryStatus::TooEasy),
            "mastered" => Ok(MemoryStatus::Mastered),
            _ => Err(UnknownVariant {
                kind: "memory status",
                value,
            }),
        }
    }
}

/// Spaced-repetition bookkeeping for one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MemoryState {
    pub content_id: i64,
    #[sqlx(try_from = "String")]
    pub status: MemoryStatus,
    /// Set by an explicit "too easy" override; keeps `status` fixed until reset.
    pub status_pinned: bool,
    pub memory_strength: f64,
    pub review_count: i32,
    pub correct_count: i32,
    pub interval_days: i32,
    pub ease_factor: f64,
    pub next_review: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Seconds spent answering, across all reviews.
    pub total_time: i64,
}

impl MemoryState {
    /// State for a card that has never been studied.
    pub fn fresh(content_id: i64) -> Self {
        Self {
            content_id,
            status: MemoryStatus::New,
            status_pinned: false,
            memory_strength: 0.0,
            review_count: 0,
            correct_count: 0,
            interval_days: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            next_review: None,
            last_reviewed: None,
            total_time: 0,
        }
    }

    /// Status implied by strength and review count alone.
    pub fn derived_status(&self) -> MemoryStatus {
        if self.memory_strength >= MASTERED_STRENGTH && self.review_count >= MASTERED_MIN_REVIEWS
        {
            MemoryStatus::Mastered
        } else if self.memory_strength >= TOO_EASY_STRENGTH {
            MemoryStatus::TooEasy
        } else if self.review_count == 0 {
            MemoryStatus::New
        } else {
            MemoryStatus::Learning
        }
    }

    /// Re-derives `status` unless it is pinned.
    pub fn refresh_status(&mut self) {
        if !self.status_pinned {
            self.status = self.derived_status();
        }
    }
}
