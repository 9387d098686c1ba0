//! Batch study flow: resumable runs over a deck, closed explicitly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::study::{StudyBatch, StudyRecord};
use crate::scheduling::SchedulingPolicy;
use crate::selection::content_selector::top_up;
use crate::selection::queries::select_content;
use crate::study::config::{fetch_deck, load_study_config, resolve_daily_goal};
use crate::study::items::{present_all, StudyItem};
use crate::study::memory::{fetch_content, get_or_create_memory_state, save_memory_state};
use crate::study::tracker::{
    ensure_in_deck, plan_batch_answer, Answer, NewStudyRecord, ProgressTracker,
};

#[derive(Debug, Serialize)]
pub struct BatchStart {
    pub batch_id: i64,
    pub items: Vec<StudyItem>,
    pub cursor: i32,
    pub total_items: usize,
    pub daily_goal: usize,
    pub resumed: bool,
}

#[derive(Debug, Serialize)]
pub struct AnswerResult {
    pub success: bool,
    pub completed: bool,
    pub record_id: i64,
}

#[derive(Debug, Serialize)]
pub struct BatchCompletion {
    pub success: bool,
    pub total_duration: i64,
}

/// What to do when a duration update names a batch that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBatch {
    NotFound,
    Ignore,
}

// ────────────────────────────────────────────────────────────────────────────
// Row access
// ────────────────────────────────────────────────────────────────────────────

async fn lock_batch(conn: &mut PgConnection, batch_id: i64) -> Result<Option<StudyBatch>, AppError> {
    Ok(
        sqlx::query_as::<_, StudyBatch>("SELECT * FROM study_batches WHERE id = $1 FOR UPDATE")
            .bind(batch_id)
            .fetch_optional(conn)
            .await?,
    )
}

async fn require_batch(conn: &mut PgConnection, batch_id: i64) -> Result<StudyBatch, AppError> {
    lock_batch(conn, batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch {batch_id} not found")))
}

async fn save_batch(conn: &mut PgConnection, batch: &StudyBatch) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE study_batches
        SET current_index = $2,
            is_completed = $3,
            completed_at = $4,
            total_duration = $5
        WHERE id = $1
        "#,
    )
    .bind(batch.id)
    .bind(batch.current_index)
    .bind(batch.is_completed)
    .bind(batch.completed_at)
    .bind(batch.total_duration)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_record(
    conn: &mut PgConnection,
    record: &NewStudyRecord,
) -> Result<StudyRecord, AppError> {
    Ok(sqlx::query_as::<_, StudyRecord>(
        r#"
        INSERT INTO study_records
            (batch_id, content_id, studied_at, response_time, user_input, feedback_type, is_correct)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(record.batch_id)
    .bind(record.content_id)
    .bind(record.studied_at)
    .bind(record.response_time)
    .bind(&record.user_input)
    .bind(record.feedback_type)
    .bind(record.is_correct)
    .fetch_one(conn)
    .await?)
}

/// Access to the single open-batch slot of a (user, deck) pair.
pub(crate) trait OpenBatchSlot {
    /// Inserts an open batch at cursor 0. `None` when one is already open.
    async fn try_open(
        &mut self,
        user_id: Uuid,
        deck_id: i64,
    ) -> Result<Option<StudyBatch>, AppError>;

    /// Locks and returns the open batch, if there still is one.
    async fn lock_open(
        &mut self,
        user_id: Uuid,
        deck_id: i64,
    ) -> Result<Option<StudyBatch>, AppError>;
}

impl OpenBatchSlot for PgConnection {
    async fn try_open(
        &mut self,
        user_id: Uuid,
        deck_id: i64,
    ) -> Result<Option<StudyBatch>, AppError> {
        Ok(sqlx::query_as::<_, StudyBatch>(
            r#"
            INSERT INTO study_batches (user_id, deck_id, current_index)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id, deck_id) WHERE NOT is_completed DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(deck_id)
        .fetch_optional(&mut *self)
        .await?)
    }

    async fn lock_open(
        &mut self,
        user_id: Uuid,
        deck_id: i64,
    ) -> Result<Option<StudyBatch>, AppError> {
        Ok(sqlx::query_as::<_, StudyBatch>(
            r#"
            SELECT * FROM study_batches
            WHERE user_id = $1 AND deck_id = $2 AND NOT is_completed
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(deck_id)
        .fetch_optional(&mut *self)
        .await?)
    }
}

const OPEN_BATCH_ATTEMPTS: usize = 2;

/// Returns the open batch for (user, deck), creating one at cursor 0 when
/// none exists. The second value is `true` if the batch was created.
///
/// The partial unique index on open batches makes a concurrent creator's
/// insert a no-op. If the winner's batch is completed before it can be read,
/// the insert is tried again.
pub(crate) async fn get_or_create_open_batch<S: OpenBatchSlot>(
    slot: &mut S,
    user_id: Uuid,
    deck_id: i64,
) -> Result<(StudyBatch, bool), AppError> {
    for _ in 0..OPEN_BATCH_ATTEMPTS {
        if let Some(batch) = slot.try_open(user_id, deck_id).await? {
            return Ok((batch, true));
        }
        if let Some(batch) = slot.lock_open(user_id, deck_id).await? {
            return Ok((batch, false));
        }
        warn!("Open batch for user {user_id} on deck {deck_id} closed concurrently");
    }
    Err(AppError::Conflict(format!(
        "Could not open a batch on deck {deck_id}, retry the request"
    )))
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// Starts a batch for (user, deck) or resumes the open one from its cursor.
///
/// A resumed batch whose remaining selection falls short of the daily goal is
/// topped up from a fresh pass at offset 0.
pub async fn start_or_resume_batch(
    pool: &PgPool,
    user_id: Uuid,
    deck_id: i64,
    requested_goal: Option<i32>,
    default_daily_goal: i32,
    now: DateTime<Utc>,
) -> Result<BatchStart, AppError> {
    let mut tx = pool.begin().await?;

    fetch_deck(&mut tx, deck_id).await?;
    let config = load_study_config(&mut tx, deck_id, default_daily_goal).await?;
    let daily_goal = resolve_daily_goal(&config, requested_goal, default_daily_goal)?;

    let (batch, created) = get_or_create_open_batch(&mut *tx, user_id, deck_id).await?;
    let cursor = usize::try_from(batch.current_index).unwrap_or(0);

    let mut selection = select_content(&mut tx, deck_id, daily_goal, cursor, now).await?;
    if !created && selection.len() < daily_goal {
        let supplement = select_content(&mut tx, deck_id, daily_goal, 0, now).await?;
        let before = selection.len();
        selection = top_up(selection, supplement, daily_goal);
        info!(
            "Topped up batch {} from {} to {} items",
            batch.id,
            before,
            selection.len()
        );
    }

    if selection.is_empty() {
        // Dropping the transaction discards a batch created above.
        return Err(AppError::Validation(format!(
            "Deck {deck_id} has no content to study"
        )));
    }

    tx.commit().await?;

    if created {
        info!("Created batch {} for user {user_id} on deck {deck_id}", batch.id);
    } else {
        info!(
            "Resumed batch {} for user {user_id} at index {}",
            batch.id, batch.current_index
        );
    }

    let items = present_all(selection, config.study_order);
    Ok(BatchStart {
        batch_id: batch.id,
        total_items: items.len(),
        items,
        cursor: batch.current_index,
        daily_goal,
        resumed: !created,
    })
}

/// Records one answer: audit row, cursor advance and rescheduling, committed
/// together.
pub async fn record_answer(
    pool: &PgPool,
    batch_id: i64,
    answer: Answer,
    policy: SchedulingPolicy,
    now: DateTime<Utc>,
) -> Result<AnswerResult, AppError> {
    let mut tx = pool.begin().await?;

    let batch = require_batch(&mut tx, batch_id).await?;
    batch.ensure_open().inspect_err(|e| warn!("Rejected answer: {e}"))?;

    let content = fetch_content(&mut tx, answer.content_id).await?;
    ensure_in_deck(&content, batch.deck_id)?;

    let state = get_or_create_memory_state(&mut tx, answer.content_id).await?;
    let plan = plan_batch_answer(&batch, &state, &answer, policy, now)?;

    let record = insert_record(&mut tx, &plan.record).await?;
    save_batch(&mut tx, &plan.batch).await?;
    save_memory_state(&mut tx, &plan.state).await?;

    tx.commit().await?;

    Ok(AnswerResult {
        success: true,
        completed: plan.batch.is_completed,
        record_id: record.id,
    })
}

pub async fn accumulate_duration(
    pool: &PgPool,
    batch_id: i64,
    seconds: i64,
    on_missing: MissingBatch,
) -> Result<Option<i64>, AppError> {
    let mut tx = pool.begin().await?;

    let Some(mut batch) = lock_batch(&mut tx, batch_id).await? else {
        return match on_missing {
            MissingBatch::NotFound => Err(AppError::NotFound(format!("Batch {batch_id} not found"))),
            MissingBatch::Ignore => Ok(None),
        };
    };

    batch.add_duration(seconds)?;
    save_batch(&mut tx, &batch).await?;
    tx.commit().await?;

    Ok(Some(batch.total_duration))
}

/// Closes a batch. Completing an already completed batch changes nothing.
pub async fn complete_batch(
    pool: &PgPool,
    batch_id: i64,
    now: DateTime<Utc>,
) -> Result<BatchCompletion, AppError> {
    let mut tx = pool.begin().await?;

    let mut batch = require_batch(&mut tx, batch_id).await?;
    if batch.close(now) {
        save_batch(&mut tx, &batch).await?;
        info!(
            "Completed batch {batch_id} after {} items, {}s",
            batch.current_index, batch.total_duration
        );
    }

    tx.commit().await?;

    Ok(BatchCompletion {
        success: true,
        total_duration: batch.total_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays scripted query results in order.
    #[derive(Default)]
    struct ScriptedSlot {
        inserts: VecDeque<Option<StudyBatch>>,
        locks: VecDeque<Option<StudyBatch>>,
    }

    impl OpenBatchSlot for ScriptedSlot {
        async fn try_open(
            &mut self,
            _user_id: Uuid,
            _deck_id: i64,
        ) -> Result<Option<StudyBatch>, AppError> {
            Ok(self.inserts.pop_front().flatten())
        }

        async fn lock_open(
            &mut self,
            _user_id: Uuid,
            _deck_id: i64,
        ) -> Result<Option<StudyBatch>, AppError> {
            Ok(self.locks.pop_front().flatten())
        }
    }

    fn batch(id: i64, current_index: i32) -> StudyBatch {
        StudyBatch {
            id,
            user_id: Uuid::from_u128(7),
            deck_id: 3,
            started_at: Utc::now(),
            completed_at: None,
            is_completed: false,
            current_index,
            total_duration: 0,
        }
    }

    #[tokio::test]
    async fn test_creates_when_slot_is_free() {
        let mut slot = ScriptedSlot {
            inserts: VecDeque::from([Some(batch(1, 0))]),
            ..Default::default()
        };
        let (opened, created) = get_or_create_open_batch(&mut slot, Uuid::from_u128(7), 3)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(opened.id, 1);
    }

    #[tokio::test]
    async fn test_resumes_existing_open_batch() {
        let mut slot = ScriptedSlot {
            inserts: VecDeque::from([None]),
            locks: VecDeque::from([Some(batch(4, 6))]),
        };
        let (opened, created) = get_or_create_open_batch(&mut slot, Uuid::from_u128(7), 3)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(opened.current_index, 6);
    }

    #[tokio::test]
    async fn test_retries_when_open_batch_closes_in_between() {
        let mut slot = ScriptedSlot {
            inserts: VecDeque::from([None, Some(batch(9, 0))]),
            locks: VecDeque::from([None]),
        };
        let (opened, created) = get_or_create_open_batch(&mut slot, Uuid::from_u128(7), 3)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(opened.id, 9);
    }

    #[tokio::test]
    async fn test_gives_up_with_conflict_after_repeated_races() {
        let mut slot = ScriptedSlot {
            inserts: VecDeque::from([None, None]),
            locks: VecDeque::from([None, None]),
        };
        let err = get_or_create_open_batch(&mut slot, Uuid::from_u128(7), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
