//! Progress tracking for the two study flows.
//!
//! `StudyBatch` only completes when the client says so; `StudySession`
//! completes itself once its cursor reaches `total_items`. Both expose the
//! same cursor capability through `ProgressTracker`.
//!
//! Everything here is pure: the planners return the rows to write, and the
//! callers in `batch` / `session` persist them inside one transaction.

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::deck::Content;
use crate::models::memory::MemoryState;
use crate::models::study::{StudyBatch, StudySession};
use crate::scheduling::{Feedback, SchedulingPolicy};

pub trait ProgressTracker {
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn cursor(&self) -> i32;
    fn is_completed(&self) -> bool;

    /// Moves past one answered item. Returns `true` if this completed the run.
    fn advance(&mut self, now: DateTime<Utc>) -> Result<bool, AppError>;

    /// Ends the run. Returns `false` if it was already closed, in which case
    /// nothing changes.
    fn close(&mut self, now: DateTime<Utc>) -> bool;

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::Conflict(format!(
                "{} {} is already completed",
                Self::KIND,
                self.id()
            )));
        }
        Ok(())
    }
}

impl ProgressTracker for StudyBatch {
    const KIND: &'static str = "Batch";

    fn id(&self) -> i64 {
        self.id
    }

    fn cursor(&self) -> i32 {
        self.current_index
    }

    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn advance(&mut self, _now: DateTime<Utc>) -> Result<bool, AppError> {
        self.ensure_open()?;
        self.current_index += 1;
        Ok(false)
    }

    fn close(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(now);
        true
    }
}

impl StudyBatch {
    pub fn add_duration(&mut self, seconds: i64) -> Result<(), AppError> {
        if seconds < 0 {
            return Err(AppError::Validation(format!(
                "duration must not be negative, got {seconds}"
            )));
        }
        self.total_duration = self.total_duration.saturating_add(seconds);
        Ok(())
    }
}

impl ProgressTracker for StudySession {
    const KIND: &'static str = "Session";

    fn id(&self) -> i64 {
        self.id
    }

    fn cursor(&self) -> i32 {
        self.current_index
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Result<bool, AppError> {
        self.ensure_open()?;
        self.current_index += 1;
        if self.current_index >= self.total_items {
            self.completed = true;
            self.ended_at = Some(now);
            return Ok(true);
        }
        Ok(false)
    }

    fn close(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.end(now);
        true
    }
}

impl StudySession {
    /// Per-session statistics for one answer, from the post-answer state.
    pub fn tally(&mut self, state_after: &MemoryState, feedback: Feedback) {
        if state_after.review_count == 1 {
            self.new_items += 1;
        } else {
            self.reviewed_items += 1;
        }
        if feedback == Feedback::Remembered {
            self.correct_answers += 1;
        }
    }

    /// Stamps `ended_at` without completing the session.
    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Answer planning
// ────────────────────────────────────────────────────────────────────────────

/// Rejects an answer for a card outside the run's deck.
pub fn ensure_in_deck(content: &Content, deck_id: i64) -> Result<(), AppError> {
    if content.deck_id != deck_id {
        return Err(AppError::Validation(format!(
            "Content {} does not belong to deck {deck_id}",
            content.id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub content_id: i64,
    pub feedback: Feedback,
    pub user_input: String,
    pub response_time: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStudyRecord {
    pub batch_id: i64,
    pub content_id: i64,
    pub studied_at: DateTime<Utc>,
    pub response_time: i64,
    pub user_input: String,
    pub feedback_type: &'static str,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct BatchAnswerPlan {
    pub batch: StudyBatch,
    pub state: MemoryState,
    pub record: NewStudyRecord,
}

/// Everything one batch answer writes: the advanced batch, the rescheduled
/// memory state and the audit record. Fails without side effects.
pub fn plan_batch_answer(
    batch: &StudyBatch,
    state: &MemoryState,
    answer: &Answer,
    policy: SchedulingPolicy,
    now: DateTime<Utc>,
) -> Result<BatchAnswerPlan, AppError> {
    if state.content_id != answer.content_id {
        return Err(AppError::Internal(anyhow::anyhow!(
            "memory state for content {} used for content {}",
            state.content_id,
            answer.content_id
        )));
    }

    let mut next_batch = batch.clone();
    next_batch.advance(now)?;
    let next_state = policy.apply(state, answer.feedback, answer.response_time, now)?;

    Ok(BatchAnswerPlan {
        record: NewStudyRecord {
            batch_id: batch.id,
            content_id: answer.content_id,
            studied_at: now,
            response_time: answer.response_time,
            user_input: answer.user_input.clone(),
            feedback_type: answer.feedback.as_str(),
            is_correct: answer.is_correct,
        },
        batch: next_batch,
        state: next_state,
    })
}

#[derive(Debug, Clone)]
pub struct SessionAnswerPlan {
    pub session: StudySession,
    pub state: MemoryState,
    pub completed: bool,
}

pub fn plan_session_answer(
    session: &StudySession,
    state: &MemoryState,
    feedback: Feedback,
    response_time: i64,
    policy: SchedulingPolicy,
    now: DateTime<Utc>,
) -> Result<SessionAnswerPlan, AppError> {
    session.ensure_open()?;
    let next_state = policy.apply(state, feedback, response_time, now)?;

    let mut next_session = session.clone();
    let completed = next_session.advance(now)?;
    next_session.tally(&next_state, feedback);

    Ok(SessionAnswerPlan {
        session: next_session,
        state: next_state,
        completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::memory::MemoryStatus;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 30, 0).unwrap()
    }

    fn open_batch() -> StudyBatch {
        StudyBatch {
            id: 42,
            user_id: Uuid::from_u128(1),
            deck_id: 1,
            started_at: now() - Duration::minutes(5),
            completed_at: None,
            is_completed: false,
            current_index: 0,
            total_duration: 0,
        }
    }

    fn session(total_items: i32) -> StudySession {
        StudySession {
            id: 7,
            deck_id: 1,
            daily_goal: 20,
            duration: 0,
            total_items,
            new_items: 0,
            reviewed_items: 0,
            correct_answers: 0,
            current_index: 0,
            completed: false,
            ended_at: None,
            created_at: now(),
        }
    }

    fn answer(content_id: i64, feedback: Feedback) -> Answer {
        Answer {
            content_id,
            feedback,
            user_input: "neko".to_string(),
            response_time: 6,
            is_correct: feedback != Feedback::Forgotten,
        }
    }

    fn card(id: i64, deck_id: i64) -> Content {
        Content {
            id,
            deck_id,
            content_type: "word".to_string(),
            front: "neko".to_string(),
            back: "猫".to_string(),
            example: None,
            unit: None,
            page: None,
            sort_order: None,
            created_at: now(),
        }
    }

    #[test]
    fn test_answer_for_other_deck_rejected() {
        let s = session(3);
        assert!(ensure_in_deck(&card(5, s.deck_id), s.deck_id).is_ok());
        assert!(matches!(
            ensure_in_deck(&card(5, 99), s.deck_id),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_batch_answer_advances_and_schedules() {
        let batch = open_batch();
        let state = MemoryState::fresh(5);
        let plan = plan_batch_answer(
            &batch,
            &state,
            &answer(5, Feedback::Forgotten),
            SchedulingPolicy::Ebbinghaus,
            now(),
        )
        .unwrap();

        assert_eq!(plan.batch.current_index, 1);
        assert!(!plan.batch.is_completed);
        assert_eq!(plan.state.review_count, 1);
        assert_eq!(plan.state.interval_days, 1);
        assert_eq!(plan.state.status, MemoryStatus::Learning);
        assert_eq!(plan.record.feedback_type, "forgotten");
        assert_eq!(plan.record.batch_id, 42);
        assert!(!plan.record.is_correct);
    }

    #[test]
    fn test_completed_batch_rejects_answers() {
        let mut batch = open_batch();
        batch.close(now());
        let err = plan_batch_answer(
            &batch,
            &MemoryState::fresh(5),
            &answer(5, Feedback::Remembered),
            SchedulingPolicy::Ebbinghaus,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_invalid_answer_plans_nothing() {
        let batch = open_batch();
        let mut bad = answer(5, Feedback::Remembered);
        bad.response_time = -3;
        let result = plan_batch_answer(
            &batch,
            &MemoryState::fresh(5),
            &bad,
            SchedulingPolicy::Ebbinghaus,
            now(),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(batch.current_index, 0);
    }

    #[test]
    fn test_mismatched_state_rejected() {
        let result = plan_batch_answer(
            &open_batch(),
            &MemoryState::fresh(6),
            &answer(5, Feedback::Remembered),
            SchedulingPolicy::Ebbinghaus,
            now(),
        );
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut once = open_batch();
        assert!(once.close(now()));

        let mut twice = open_batch();
        twice.close(now());
        assert!(!twice.close(now() + Duration::hours(1)));

        assert_eq!(once, twice);
        assert_eq!(twice.completed_at, Some(now()));
    }

    #[test]
    fn test_duration_accumulates() {
        let mut batch = open_batch();
        batch.add_duration(30).unwrap();
        batch.add_duration(45).unwrap();
        assert_eq!(batch.total_duration, 75);
        assert!(matches!(
            batch.add_duration(-1),
            Err(AppError::Validation(_))
        ));
        assert_eq!(batch.total_duration, 75);
    }

    #[test]
    fn test_session_completes_itself_at_total() {
        let mut s = session(2);
        let state = MemoryState::fresh(1);

        let first = plan_session_answer(
            &s,
            &state,
            Feedback::Remembered,
            3,
            SchedulingPolicy::Doubling,
            now(),
        )
        .unwrap();
        assert!(!first.completed);
        s = first.session;

        let second = plan_session_answer(
            &s,
            &state,
            Feedback::Forgotten,
            3,
            SchedulingPolicy::Doubling,
            now(),
        )
        .unwrap();
        assert!(second.completed);
        assert!(second.session.completed);
        assert_eq!(second.session.ended_at, Some(now()));

        let err = plan_session_answer(
            &second.session,
            &state,
            Feedback::Remembered,
            3,
            SchedulingPolicy::Doubling,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_session_tally() {
        let mut s = session(10);
        let mut fresh_after = MemoryState::fresh(1);
        fresh_after.review_count = 1;
        let mut seen_after = MemoryState::fresh(2);
        seen_after.review_count = 4;

        s.tally(&fresh_after, Feedback::Remembered);
        s.tally(&seen_after, Feedback::Forgotten);
        s.tally(&seen_after, Feedback::Remembered);

        assert_eq!(s.new_items, 1);
        assert_eq!(s.reviewed_items, 2);
        assert_eq!(s.correct_answers, 2);
    }

    #[test]
    fn test_session_end_does_not_complete() {
        let mut s = session(3);
        s.end(now());
        assert!(!s.completed);
        assert_eq!(s.ended_at, Some(now()));
        s.end(now() + Duration::hours(2));
        assert_eq!(s.ended_at, Some(now()));
    }

    #[test]
    fn test_session_close_keeps_earlier_end() {
        let mut s = session(5);
        s.end(now());
        assert!(s.close(now() + Duration::minutes(10)));
        assert!(s.completed);
        assert_eq!(s.ended_at, Some(now()));
        assert!(!s.close(now() + Duration::hours(1)));
    }

    #[test]
    fn test_empty_session_completes_on_first_answer() {
        let mut s = session(0);
        assert!(s.advance(now()).unwrap());
    }
}
