use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A resumable study run over one deck, closed explicitly by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudyBatch {
    pub id: i64,
    pub user_id: Uuid,
    pub deck_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub current_index: i32,
    /// Seconds.
    pub total_duration: i64,
}

/// One answer. Inserted once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudyRecord {
    pub id: i64,
    pub batch_id: i64,
    pub content_id: i64,
    pub studied_at: DateTime<Utc>,
    pub response_time: i64,
    pub user_input: String,
    pub feedback_type: String,
    pub is_correct: bool,
}

/// Legacy study run: fixed item count, completes itself when the cursor
/// reaches `total_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StudySession {
    pub id: i64,
    pub deck_id: i64,
    pub daily_goal: i32,
    pub duration: i64,
    pub total_items: i32,
    pub new_items: i32,
    pub reviewed_items: i32,
    pub correct_answers: i32,
    pub current_index: i32,
    pub completed: bool,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
