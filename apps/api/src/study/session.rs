//! Legacy session flow. A session fixes its item count at start and
//! completes itself once that many answers are in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::errors::AppError;
use crate::models::study::StudySession;
use crate::scheduling::{Feedback, SchedulingPolicy};
use crate::selection::queries::{select_content, select_legacy_content};
use crate::selection::ItemKind;
use crate::study::config::{fetch_deck, load_study_config, resolve_daily_goal};
use crate::study::items::{present_all, StudyItem};
use crate::study::memory::{fetch_content, get_or_create_memory_state, save_memory_state};
use crate::study::tracker::{ensure_in_deck, plan_session_answer, ProgressTracker};

#[derive(Debug, Serialize)]
pub struct SessionStart {
    pub session_id: i64,
    pub items: Vec<StudyItem>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionDetails {
    Completed,
    InProgress {
        items: Vec<StudyItem>,
        current_index: i32,
        total_items: i32,
    },
}

#[derive(Debug, Serialize)]
pub struct FeedbackResult {
    pub success: bool,
    pub completed: bool,
}

async fn fetch_session(
    conn: &mut PgConnection,
    session_id: i64,
    lock: bool,
) -> Result<StudySession, AppError> {
    let sql = if lock {
        "SELECT * FROM study_sessions WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT * FROM study_sessions WHERE id = $1"
    };
    sqlx::query_as::<_, StudySession>(sql)
        .bind(session_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

async fn save_session(conn: &mut PgConnection, session: &StudySession) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE study_sessions
        SET current_index = $2,
            completed = $3,
            ended_at = $4,
            new_items = $5,
            reviewed_items = $6,
            correct_answers = $7
        WHERE id = $1
        "#,
    )
    .bind(session.id)
    .bind(session.current_index)
    .bind(session.completed)
    .bind(session.ended_at)
    .bind(session.new_items)
    .bind(session.reviewed_items)
    .bind(session.correct_answers)
    .execute(conn)
    .await?;
    Ok(())
}

/// Opens a session over the legacy selection and seeds memory states for
/// its new items.
pub async fn start_session(
    pool: &PgPool,
    deck_id: i64,
    requested_goal: Option<i32>,
    default_daily_goal: i32,
    now: DateTime<Utc>,
) -> Result<SessionStart, AppError> {
    let mut tx = pool.begin().await?;

    fetch_deck(&mut tx, deck_id).await?;
    let config = load_study_config(&mut tx, deck_id, default_daily_goal).await?;
    let daily_goal = resolve_daily_goal(&config, requested_goal, default_daily_goal)?;

    let selection = select_legacy_content(&mut tx, deck_id, daily_goal, now).await?;
    if selection.is_empty() {
        return Err(AppError::Validation(format!(
            "Deck {deck_id} has no content to study"
        )));
    }

    let session_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO study_sessions (deck_id, daily_goal, total_items, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(deck_id)
    .bind(daily_goal as i32)
    .bind(selection.len() as i32)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for item in selection.iter().filter(|i| i.kind == ItemKind::New) {
        get_or_create_memory_state(&mut tx, item.content.id).await?;
    }

    tx.commit().await?;

    info!(
        "Started session {session_id} on deck {deck_id} with {} items",
        selection.len()
    );

    Ok(SessionStart {
        session_id,
        items: present_all(selection, config.study_order),
    })
}

/// Remaining items from the session's cursor, or `Completed`.
pub async fn session_details(
    pool: &PgPool,
    session_id: i64,
    default_daily_goal: i32,
    now: DateTime<Utc>,
) -> Result<SessionDetails, AppError> {
    let mut conn = pool.acquire().await?;

    let session = fetch_session(&mut conn, session_id, false).await?;
    if session.is_completed() {
        return Ok(SessionDetails::Completed);
    }

    let config = load_study_config(&mut conn, session.deck_id, default_daily_goal).await?;
    let daily_goal = resolve_daily_goal(&config, Some(session.daily_goal), default_daily_goal)?;
    let cursor = usize::try_from(session.cursor()).unwrap_or(0);
    let selection = select_content(&mut conn, session.deck_id, daily_goal, cursor, now).await?;

    Ok(SessionDetails::InProgress {
        items: present_all(selection, config.study_order),
        current_index: session.current_index,
        total_items: session.total_items,
    })
}

/// Applies one answer under `policy` (doubling unless the caller picks
/// otherwise) and advances the session, completing it at the last item.
pub async fn submit_session_feedback(
    pool: &PgPool,
    session_id: i64,
    content_id: i64,
    feedback: Feedback,
    response_time: i64,
    policy: SchedulingPolicy,
    now: DateTime<Utc>,
) -> Result<FeedbackResult, AppError> {
    let mut tx = pool.begin().await?;

    let session = fetch_session(&mut tx, session_id, true).await?;
    session.ensure_open()?;
    let content = fetch_content(&mut tx, content_id).await?;
    ensure_in_deck(&content, session.deck_id)?;

    let state = get_or_create_memory_state(&mut tx, content_id).await?;
    let plan = plan_session_answer(&session, &state, feedback, response_time, policy, now)?;

    save_memory_state(&mut tx, &plan.state).await?;
    save_session(&mut tx, &plan.session).await?;

    tx.commit().await?;

    if plan.completed {
        info!(
            "Session {session_id} completed: {} new, {} reviewed, {} correct",
            plan.session.new_items, plan.session.reviewed_items, plan.session.correct_answers
        );
    }

    Ok(FeedbackResult {
        success: true,
        completed: plan.completed,
    })
}

/// Stamps the session's end time. Does not complete it.
pub async fn end_session(
    pool: &PgPool,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let mut session = fetch_session(&mut tx, session_id, true).await?;
    session.end(now);
    save_session(&mut tx, &session).await?;

    tx.commit().await?;
    info!("Ended session {session_id}");
    Ok(())
}
