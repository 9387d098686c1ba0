use serde::Deserialize;
use sqlx::PgConnection;
use tracing::info;

use crate::errors::AppError;
use crate::models::deck::{Deck, StudyConfig, StudyOrder, DEFAULT_MODE};

/// Returns the deck or NotFound.
pub async fn fetch_deck(conn: &mut PgConnection, deck_id: i64) -> Result<Deck, AppError> {
    sqlx::query_as::<_, Deck>("SELECT * FROM decks WHERE id = $1")
        .bind(deck_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deck {deck_id} not found")))
}

/// The deck's study config, or unconfigured defaults when none was saved.
pub async fn load_study_config(
    conn: &mut PgConnection,
    deck_id: i64,
    default_daily_goal: i32,
) -> Result<StudyConfig, AppError> {
    let config = sqlx::query_as::<_, StudyConfig>(
        r#"
        SELECT deck_id, mode, daily_goal, study_order, is_configured
        FROM study_configs
        WHERE deck_id = $1
        "#,
    )
    .bind(deck_id)
    .fetch_optional(conn)
    .await?;

    Ok(config.unwrap_or_else(|| StudyConfig::unconfigured(deck_id, default_daily_goal)))
}

#[derive(Debug, Deserialize)]
pub struct SaveStudyConfig {
    pub mode: Option<String>,
    pub daily_goal: Option<i32>,
    pub study_order: Option<StudyOrder>,
}

pub async fn save_study_config(
    conn: &mut PgConnection,
    deck_id: i64,
    request: SaveStudyConfig,
    default_daily_goal: i32,
) -> Result<StudyConfig, AppError> {
    let daily_goal = request.daily_goal.unwrap_or(default_daily_goal);
    validate_daily_goal(daily_goal)?;

    fetch_deck(&mut *conn, deck_id).await?;

    let config = StudyConfig {
        deck_id,
        mode: request.mode.unwrap_or_else(|| DEFAULT_MODE.to_string()),
        daily_goal,
        study_order: request.study_order.unwrap_or_default(),
        is_configured: true,
    };

    sqlx::query(
        r#"
        INSERT INTO study_configs (deck_id, mode, daily_goal, study_order, is_configured)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (deck_id) DO UPDATE
        SET mode = EXCLUDED.mode,
            daily_goal = EXCLUDED.daily_goal,
            study_order = EXCLUDED.study_order,
            is_configured = TRUE,
            updated_at = NOW()
        "#,
    )
    .bind(deck_id)
    .bind(&config.mode)
    .bind(config.daily_goal)
    .bind(config.study_order.as_str())
    .execute(conn)
    .await?;

    info!("Saved study config for deck {deck_id}: daily_goal={daily_goal}");
    Ok(config)
}

/// Batch size for a study run: a saved deck config wins, then the caller's
/// request, then the service default.
pub fn resolve_daily_goal(
    config: &StudyConfig,
    requested: Option<i32>,
    default_daily_goal: i32,
) -> Result<usize, AppError> {
    let goal = if config.is_configured {
        config.daily_goal
    } else {
        requested.unwrap_or(default_daily_goal)
    };
    validate_daily_goal(goal)?;
    Ok(goal as usize)
}

fn validate_daily_goal(goal: i32) -> Result<(), AppError> {
    if goal < 1 {
        return Err(AppError::Validation(format!(
            "daily_goal must be at least 1, got {goal}"
        )));
    }
    Ok(())
}
