use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::errors::AppError;
use crate::study::config::fetch_deck;

/// Dashboard counts for one deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DeckSummary {
    pub total: i64,
    /// Cards with a memory state, i.e. studied at least once.
    pub learned: i64,
    pub due: i64,
    pub mastered: i64,
}

pub async fn deck_summary(
    pool: &PgPool,
    deck_id: i64,
    now: DateTime<Utc>,
) -> Result<DeckSummary, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_deck(&mut conn, deck_id).await?;

    Ok(sqlx::query_as::<_, DeckSummary>(
        r#"
        SELECT
            COUNT(c.id) AS total,
            COUNT(ms.id) AS learned,
            COUNT(ms.id) FILTER (
                WHERE ms.next_review <= $2 AND ms.status <> 'too_easy'
            ) AS due,
            COUNT(ms.id) FILTER (WHERE ms.status = 'mastered') AS mastered
        FROM content c
        LEFT JOIN memory_states ms ON ms.content_id = c.id
        WHERE c.deck_id = $1
        "#,
    )
    .bind(deck_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?)
}
