use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::errors::AppError;
use crate::models::deck::Content;
use crate::selection::content_selector::{
    assemble_legacy_selection, assemble_selection, new_content_limit, DueReview, SelectedItem,
};

/// Due reviews for a deck: past `next_review`, not deferred or mastered,
/// weakest memory first.
pub async fn fetch_due_reviews(
    conn: &mut PgConnection,
    deck_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<DueReview>, AppError> {
    Ok(sqlx::query_as::<_, DueReview>(
        r#"
        SELECT c.*, ms.memory_strength
        FROM memory_states ms
        JOIN content c ON c.id = ms.content_id
        WHERE c.deck_id = $1
          AND ms.next_review <= $2
          AND ms.status NOT IN ('too_easy', 'mastered')
        ORDER BY ms.memory_strength ASC, c.id ASC
        "#,
    )
    .bind(deck_id)
    .bind(now)
    .fetch_all(conn)
    .await?)
}

/// Deck content outside `exclude_ids`, in primary-key order.
pub async fn fetch_new_content(
    conn: &mut PgConnection,
    deck_id: i64,
    exclude_ids: &[i64],
    limit: usize,
) -> Result<Vec<Content>, AppError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    Ok(sqlx::query_as::<_, Content>(
        r#"
        SELECT * FROM content
        WHERE deck_id = $1 AND id <> ALL($2)
        ORDER BY id ASC
        LIMIT $3
        "#,
    )
    .bind(deck_id)
    .bind(exclude_ids)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(conn)
    .await?)
}

/// `select(deck, target, offset)`: reviews then new content, windowed.
pub async fn select_content(
    conn: &mut PgConnection,
    deck_id: i64,
    target: usize,
    start_offset: usize,
    now: DateTime<Utc>,
) -> Result<Vec<SelectedItem>, AppError> {
    let due = fetch_due_reviews(&mut *conn, deck_id, now).await?;
    let due_ids: Vec<i64> = due.iter().map(|d| d.content.id).collect();
    let new = fetch_new_content(
        &mut *conn,
        deck_id,
        &due_ids,
        new_content_limit(target, start_offset),
    )
    .await?;

    Ok(assemble_selection(due, new, target, start_offset))
}

/// Selection for the legacy session flow.
pub async fn select_legacy_content(
    conn: &mut PgConnection,
    deck_id: i64,
    target: usize,
    now: DateTime<Utc>,
) -> Result<Vec<SelectedItem>, AppError> {
    let due = sqlx::query_as::<_, Content>(
        r#"
        SELECT c.*
        FROM memory_states ms
        JOIN content c ON c.id = ms.content_id
        WHERE c.deck_id = $1
          AND ms.next_review <= $2
          AND ms.status <> 'too_easy'
        ORDER BY c.id ASC
        "#,
    )
    .bind(deck_id)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    let due_ids: Vec<i64> = due.iter().map(|c| c.id).collect();
    let room = target.saturating_sub(due.len());
    let new = fetch_new_content(&mut *conn, deck_id, &due_ids, room).await?;

    Ok(assemble_legacy_selection(due, new, target))
}
