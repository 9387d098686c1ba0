//! Interval doubling used by the legacy session and practice flows.
//! No ease factor and no status re-derivation.

use chrono::{DateTime, Utc};

use crate::models::memory::{MemoryState, MemoryStatus};
use crate::scheduling::{days_from, MAX_INTERVAL_DAYS};

const STRENGTH_STEP: f64 = 0.2;
const STRENGTH_PENALTY: f64 = 0.3;

/// Applies a remembered (`recalled = true`) or forgotten answer.
pub fn update(
    state: &MemoryState,
    recalled: bool,
    response_time_secs: i64,
    now: DateTime<Utc>,
) -> MemoryState {
    let mut next = state.clone();

    next.review_count += 1;
    next.total_time += response_time_secs;

    if recalled {
        next.correct_count += 1;
        next.memory_strength = (next.memory_strength + STRENGTH_STEP).min(1.0);
        next.interval_days = if next.interval_days == 0 {
            1
        } else {
            next.interval_days.saturating_mul(2).min(MAX_INTERVAL_DAYS)
        };
    } else {
        next.correct_count = 0;
        next.memory_strength = (next.memory_strength - STRENGTH_PENALTY).max(0.0);
        next.interval_days = (next.interval_days / 2).max(1);
    }

    next.next_review = Some(days_from(now, next.interval_days));
    next.last_reviewed = Some(now);

    if next.status == MemoryStatus::New && !next.status_pinned {
        next.status = MemoryStatus::Learning;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn with_interval(days: i32) -> MemoryState {
        let mut state = MemoryState::fresh(9);
        state.interval_days = days;
        state.status = MemoryStatus::Learning;
        state.review_count = 1;
        state
    }

    #[test]
    fn test_remembered_doubles() {
        assert_eq!(update(&with_interval(0), true, 0, now()).interval_days, 1);
        assert_eq!(update(&with_interval(1), true, 0, now()).interval_days, 2);
        assert_eq!(update(&with_interval(12), true, 0, now()).interval_days, 24);
    }

    #[test]
    fn test_forgotten_halves_with_floor_of_one() {
        assert_eq!(update(&with_interval(0), false, 0, now()).interval_days, 1);
        assert_eq!(update(&with_interval(1), false, 0, now()).interval_days, 1);
        assert_eq!(update(&with_interval(7), false, 0, now()).interval_days, 3);
    }

    #[test]
    fn test_next_review_follows_interval() {
        let next = update(&with_interval(4), true, 0, now());
        assert_eq!(next.next_review, Some(now() + Duration::days(8)));
        assert_eq!(next.last_reviewed, Some(now()));
    }

    #[test]
    fn test_ease_factor_untouched() {
        let mut state = with_interval(3);
        state.ease_factor = 1.9;
        assert_eq!(update(&state, false, 0, now()).ease_factor, 1.9);
        assert_eq!(update(&state, true, 0, now()).ease_factor, 1.9);
    }

    #[test]
    fn test_strength_and_counters() {
        let mut state = with_interval(2);
        state.memory_strength = 0.9;
        state.correct_count = 3;
        let up = update(&state, true, 5, now());
        assert_eq!(up.memory_strength, 1.0);
        assert_eq!(up.correct_count, 4);
        assert_eq!(up.review_count, 2);
        assert_eq!(up.total_time, 5);

        let down = update(&state, false, 5, now());
        assert!((down.memory_strength - 0.6).abs() < 1e-9);
        assert_eq!(down.correct_count, 0);
    }

    #[test]
    fn test_new_item_moves_to_learning_only() {
        let fresh = MemoryState::fresh(9);
        assert_eq!(update(&fresh, true, 0, now()).status, MemoryStatus::Learning);

        let mut strong = with_interval(2);
        strong.memory_strength = 0.95;
        strong.review_count = 8;
        // status is not re-derived by this policy
        assert_eq!(update(&strong, true, 0, now()).status, MemoryStatus::Learning);
    }

    #[test]
    fn test_diverges_from_ease_factor_policy() {
        use crate::scheduling::{ebbinghaus, Quality};

        let mut doubled = MemoryState::fresh(1);
        let mut eased = MemoryState::fresh(1);
        let good = Quality::new(4).unwrap();
        for _ in 0..5 {
            doubled = update(&doubled, true, 0, now());
            eased = ebbinghaus::update(&eased, good, 0, now());
        }
        assert_eq!(doubled.interval_days, 16);
        assert_eq!(eased.interval_days, 87);
    }
}
