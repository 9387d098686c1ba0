// Review scheduling engine.
// Pure state transitions over MemoryState; persistence lives in `study`.

pub mod doubling;
pub mod ebbinghaus;
pub mod feedback;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use feedback::{Feedback, Quality};

use crate::errors::AppError;
use crate::models::memory::{MemoryState, MemoryStatus};

/// Deferral applied by the "too easy" override.
pub const TOO_EASY_DEFERRAL_DAYS: i32 = 365;
/// Upper bound on any computed interval (100 years).
pub const MAX_INTERVAL_DAYS: i32 = 36_500;

/// Which interval formula a study flow uses. Both are kept because they give
/// very different long-term intervals for the same answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    /// Fixed early steps then `14 * ease^(n-3)`; batch flow.
    #[default]
    Ebbinghaus,
    /// Double on recall, halve on lapse; session and practice flows.
    Doubling,
}

impl SchedulingPolicy {
    /// Applies one answer to `state` and returns the new state.
    ///
    /// `TooEasy` takes the override path under either policy.
    pub fn apply(
        &self,
        state: &MemoryState,
        feedback: Feedback,
        response_time_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<MemoryState, AppError> {
        validate_response_time(response_time_secs)?;

        let next = match feedback {
            Feedback::TooEasy => mark_too_easy(state, response_time_secs, now),
            _ => self.apply_quality(state, feedback.quality(), response_time_secs, now)?,
        };

        debug!(
            content_id = next.content_id,
            policy = ?self,
            feedback = %feedback,
            interval = next.interval_days,
            status = next.status.as_str(),
            "Scheduled review"
        );
        Ok(next)
    }

    /// Applies a raw 0–5 quality score. Scores of 3 and up count as recalled
    /// under the doubling policy.
    pub fn apply_quality(
        &self,
        state: &MemoryState,
        quality: Quality,
        response_time_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<MemoryState, AppError> {
        validate_response_time(response_time_secs)?;
        Ok(match self {
            SchedulingPolicy::Ebbinghaus => {
                ebbinghaus::update(state, quality, response_time_secs, now)
            }
            SchedulingPolicy::Doubling => {
                doubling::update(state, quality.is_passing(), response_time_secs, now)
            }
        })
    }
}

/// The "too easy" override: full strength, deferred a year, status pinned.
/// Does not count as a review.
pub fn mark_too_easy(
    state: &MemoryState,
    response_time_secs: i64,
    now: DateTime<Utc>,
) -> MemoryState {
    let mut next = state.clone();
    next.memory_strength = 1.0;
    next.status = MemoryStatus::TooEasy;
    next.status_pinned = true;
    next.next_review = Some(days_from(now, TOO_EASY_DEFERRAL_DAYS));
    next.last_reviewed = Some(now);
    next.total_time += response_time_secs;
    next
}

/// Clears a pinned status and re-derives it from strength and review count.
pub fn reset_status(state: &MemoryState) -> MemoryState {
    let mut next = state.clone();
    next.status_pinned = false;
    next.refresh_status();
    next
}

pub(crate) fn days_from(now: DateTime<Utc>, days: i32) -> DateTime<Utc> {
    now + Duration::days(i64::from(days))
}

fn validate_response_time(secs: i64) -> Result<(), AppError> {
    if secs < 0 {
        return Err(AppError::Validation(format!(
            "response_time must not be negative, got {secs}"
        )));
    }
    Ok(())
}
