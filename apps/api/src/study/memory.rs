use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::errors::AppError;
use crate::models::deck::Content;
use crate::models::memory::MemoryState;
use crate::scheduling;

const MEMORY_STATE_COLUMNS: &str = r#"
    content_id, status, status_pinned, memory_strength, review_count,
    correct_count, interval_days, ease_factor, next_review, last_reviewed, total_time
"#;

pub async fn fetch_content(conn: &mut PgConnection, content_id: i64) -> Result<Content, AppError> {
    sqlx::query_as::<_, Content>("SELECT * FROM content WHERE id = $1")
        .bind(content_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Content {content_id} not found")))
}

/// Returns the row-locked memory state, creating a fresh one first if needed.
///
/// Safe under concurrent first reviews: the insert is a no-op when another
/// transaction got there first, and `FOR UPDATE` then waits for it.
pub async fn get_or_create_memory_state(
    conn: &mut PgConnection,
    content_id: i64,
) -> Result<MemoryState, AppError> {
    let fresh = MemoryState::fresh(content_id);
    let inserted = sqlx::query(
        r#"
        INSERT INTO memory_states (content_id, status, memory_strength, ease_factor)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (content_id) DO NOTHING
        "#,
    )
    .bind(content_id)
    .bind(fresh.status.as_str())
    .bind(fresh.memory_strength)
    .bind(fresh.ease_factor)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted > 0 {
        info!("Created memory state for content {content_id}");
    }

    Ok(sqlx::query_as::<_, MemoryState>(&format!(
        "SELECT {MEMORY_STATE_COLUMNS} FROM memory_states WHERE content_id = $1 FOR UPDATE"
    ))
    .bind(content_id)
    .fetch_one(conn)
    .await?)
}

pub async fn save_memory_state(
    conn: &mut PgConnection,
    state: &MemoryState,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE memory_states
        SET status = $2,
            status_pinned = $3,
            memory_strength = $4,
            review_count = $5,
            correct_count = $6,
            interval_days = $7,
            ease_factor = $8,
            next_review = $9,
            last_reviewed = $10,
            total_time = $11,
            updated_at = NOW()
        WHERE content_id = $1
        "#,
    )
    .bind(state.content_id)
    .bind(state.status.as_str())
    .bind(state.status_pinned)
    .bind(state.memory_strength)
    .bind(state.review_count)
    .bind(state.correct_count)
    .bind(state.interval_days)
    .bind(state.ease_factor)
    .bind(state.next_review)
    .bind(state.last_reviewed)
    .bind(state.total_time)
    .execute(conn)
    .await?;
    Ok(())
}

/// Standalone "too easy" override for one card, outside any study run.
pub async fn mark_too_easy(
    pool: &PgPool,
    content_id: i64,
    now: DateTime<Utc>,
) -> Result<MemoryState, AppError> {
    let mut tx = pool.begin().await?;

    fetch_content(&mut tx, content_id).await?;
    let state = get_or_create_memory_state(&mut tx, content_id).await?;
    let next = scheduling::mark_too_easy(&state, 0, now);
    save_memory_state(&mut tx, &next).await?;

    tx.commit().await?;

    info!("Content {content_id} marked too easy until {:?}", next.next_review);
    Ok(next)
}

/// Unpins a forced status so reviews derive it again.
pub async fn reset_memory_state(pool: &PgPool, content_id: i64) -> Result<MemoryState, AppError> {
    let mut tx = pool.begin().await?;

    fetch_content(&mut tx, content_id).await?;
    let state = get_or_create_memory_state(&mut tx, content_id).await?;
    let next = scheduling::reset_status(&state);
    save_memory_state(&mut tx, &next).await?;

    tx.commit().await?;

    info!(
        "Reset memory state for content {content_id}: status={}",
        next.status.as_str()
    );
    Ok(next)
}
