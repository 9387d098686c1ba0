//! Axum route handlers for the Study API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::deck::StudyConfig;
use crate::models::memory::MemoryState;
use crate::scheduling::{Feedback, SchedulingPolicy};
use crate::state::AppState;
use crate::study::batch::{self, AnswerResult, BatchCompletion, BatchStart, MissingBatch};
use crate::study::config::{self, SaveStudyConfig};
use crate::study::memory;
use crate::study::practice::{self, PracticeMode, PracticeNext};
use crate::study::session::{self, FeedbackResult, SessionDetails, SessionStart};
use crate::study::summary::{self, DeckSummary};
use crate::study::tracker::Answer;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub user_id: Uuid,
    pub deck_id: i64,
    pub daily_goal: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub content_id: i64,
    pub feedback_type: String,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub response_time: i64,
    #[serde(default)]
    pub is_correct: bool,
    /// Defaults to the ease-factor policy.
    pub policy: Option<SchedulingPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct DurationRequest {
    pub duration: i64,
    /// Legacy clients expect a missing batch to be a silent no-op.
    #[serde(default)]
    pub ignore_missing: bool,
}

#[derive(Debug, Serialize)]
pub struct DurationResponse {
    pub success: bool,
    /// `None` when the batch was missing and `ignore_missing` was set.
    pub total_duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub deck_id: i64,
    pub daily_goal: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SessionFeedbackRequest {
    pub content_id: i64,
    pub feedback_type: String,
    #[serde(default)]
    pub response_time: i64,
    /// Defaults to the doubling policy.
    pub policy: Option<SchedulingPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct NextPracticeQuery {
    pub current_content_id: Option<i64>,
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeFeedbackRequest {
    pub content_id: i64,
    pub feedback_type: String,
    #[serde(default)]
    pub response_time: i64,
}

// ────────────────────────────────────────────────────────────────────────────
// Batch handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/study/batches
pub async fn handle_start_batch(
    State(state): State<AppState>,
    Json(req): Json<StartBatchRequest>,
) -> Result<Json<BatchStart>, AppError> {
    let start = batch::start_or_resume_batch(
        &state.db,
        req.user_id,
        req.deck_id,
        req.daily_goal,
        state.config.default_daily_goal,
        Utc::now(),
    )
    .await?;
    Ok(Json(start))
}

/// POST /api/v1/study/batches/:id/answers
pub async fn handle_record_answer(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<Json<AnswerResult>, AppError> {
    let feedback: Feedback = req.feedback_type.parse()?;
    let answer = Answer {
        content_id: req.content_id,
        feedback,
        user_input: req.user_input,
        response_time: req.response_time,
        is_correct: req.is_correct,
    };
    let policy = req.policy.unwrap_or(SchedulingPolicy::Ebbinghaus);

    let result = batch::record_answer(&state.db, batch_id, answer, policy, Utc::now()).await?;
    Ok(Json(result))
}

/// POST /api/v1/study/batches/:id/duration
pub async fn handle_accumulate_duration(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
    Json(req): Json<DurationRequest>,
) -> Result<Json<DurationResponse>, AppError> {
    let on_missing = if req.ignore_missing {
        MissingBatch::Ignore
    } else {
        MissingBatch::NotFound
    };
    let total_duration =
        batch::accumulate_duration(&state.db, batch_id, req.duration, on_missing).await?;
    Ok(Json(DurationResponse {
        success: true,
        total_duration,
    }))
}

/// POST /api/v1/study/batches/:id/complete
pub async fn handle_complete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
) -> Result<Json<BatchCompletion>, AppError> {
    Ok(Json(
        batch::complete_batch(&state.db, batch_id, Utc::now()).await?,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Session handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/study/sessions
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<SessionStart>, AppError> {
    let start = session::start_session(
        &state.db,
        req.deck_id,
        req.daily_goal,
        state.config.default_daily_goal,
        Utc::now(),
    )
    .await?;
    Ok(Json(start))
}

/// GET /api/v1/study/sessions/:id
pub async fn handle_session_details(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Json<SessionDetails>, AppError> {
    let details = session::session_details(
        &state.db,
        session_id,
        state.config.default_daily_goal,
        Utc::now(),
    )
    .await?;
    Ok(Json(details))
}

/// POST /api/v1/study/sessions/:id/feedback
pub async fn handle_session_feedback(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(req): Json<SessionFeedbackRequest>,
) -> Result<Json<FeedbackResult>, AppError> {
    let feedback: Feedback = req.feedback_type.parse()?;
    let policy = req.policy.unwrap_or(SchedulingPolicy::Doubling);

    let result = session::submit_session_feedback(
        &state.db,
        session_id,
        req.content_id,
        feedback,
        req.response_time,
        policy,
        Utc::now(),
    )
    .await?;
    Ok(Json(result))
}

/// POST /api/v1/study/sessions/:id/end
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    session::end_session(&state.db, session_id, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Practice handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/practice/decks/:id/next
pub async fn handle_next_practice_card(
    State(state): State<AppState>,
    Path(deck_id): Path<i64>,
    Query(query): Query<NextPracticeQuery>,
) -> Result<Json<PracticeNext>, AppError> {
    let mode = match query.mode.as_deref() {
        Some(raw) => raw.parse()?,
        None => PracticeMode::default(),
    };
    let next =
        practice::next_practice_card(&state.db, deck_id, query.current_content_id, mode).await?;
    Ok(Json(next))
}

/// POST /api/v1/practice/feedback
pub async fn handle_practice_feedback(
    State(state): State<AppState>,
    Json(req): Json<PracticeFeedbackRequest>,
) -> Result<Json<MemoryState>, AppError> {
    let feedback: Feedback = req.feedback_type.parse()?;
    let next = practice::submit_practice_feedback(
        &state.db,
        req.content_id,
        feedback,
        req.response_time,
        Utc::now(),
    )
    .await?;
    Ok(Json(next))
}

// ────────────────────────────────────────────────────────────────────────────
// Content & deck handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/content/:id/too-easy
pub async fn handle_mark_too_easy(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Json<MemoryState>, AppError> {
    Ok(Json(
        memory::mark_too_easy(&state.db, content_id, Utc::now()).await?,
    ))
}

/// POST /api/v1/content/:id/reset
pub async fn handle_reset_memory_state(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Json<MemoryState>, AppError> {
    Ok(Json(memory::reset_memory_state(&state.db, content_id).await?))
}

/// GET /api/v1/decks/:id/summary
pub async fn handle_deck_summary(
    State(state): State<AppState>,
    Path(deck_id): Path<i64>,
) -> Result<Json<DeckSummary>, AppError> {
    Ok(Json(
        summary::deck_summary(&state.db, deck_id, Utc::now()).await?,
    ))
}

/// GET /api/v1/decks/:id/config
pub async fn handle_get_study_config(
    State(state): State<AppState>,
    Path(deck_id): Path<i64>,
) -> Result<Json<StudyConfig>, AppError> {
    let mut conn = state.db.acquire().await?;
    config::fetch_deck(&mut conn, deck_id).await?;
    let study_config =
        config::load_study_config(&mut conn, deck_id, state.config.default_daily_goal).await?;
    Ok(Json(study_config))
}

/// PUT /api/v1/decks/:id/config
pub async fn handle_save_study_config(
    State(state): State<AppState>,
    Path(deck_id): Path<i64>,
    Json(req): Json<SaveStudyConfig>,
) -> Result<Json<StudyConfig>, AppError> {
    let mut conn = state.db.acquire().await?;
    let saved =
        config::save_study_config(&mut conn, deck_id, req, state.config.default_daily_goal)
            .await?;
    Ok(Json(saved))
}
