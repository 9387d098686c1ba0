//! Ease-factor scheduling used by the batch study flow.
//!
//! Fixed early steps (1, 3, 7, 14 days) followed by exponential growth
//! `14 * ease^(reviews - 3)`. Any failing answer drops the interval back to one day.

use chrono::{DateTime, Utc};

use crate::models::memory::{MemoryState, MAX_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::scheduling::{days_from, Quality, MAX_INTERVAL_DAYS};

const STRENGTH_STEP: f64 = 0.1;
const STRENGTH_PENALTY: f64 = 0.2;
const EASE_PENALTY: f64 = 0.2;
const EASE_BONUS: f64 = 0.1;

/// Interval steps for review counts 1 through 4.
const EARLY_STEPS: [i32; 4] = [1, 3, 7, 14];
const LONG_TERM_BASE: f64 = 14.0;

/// Interval in days for the review just recorded.
///
/// `review_count` is the count *after* this review.
pub fn next_interval(review_count: i32, ease_factor: f64, quality: Quality) -> i32 {
    if !quality.is_passing() {
        return 1;
    }
    match review_count {
        n @ 1..=4 => EARLY_STEPS[(n - 1) as usize],
        n if n >= 5 => {
            let grown = (LONG_TERM_BASE * ease_factor.powi(n - 3)).floor();
            // float -> int casts saturate
            (grown as i32).clamp(EARLY_STEPS[3], MAX_INTERVAL_DAYS)
        }
        // A count below 1 only happens when called without recording a review.
        _ => 1,
    }
}

/// Applies one general-path review and returns the updated state.
pub fn update(
    state: &MemoryState,
    quality: Quality,
    response_time_secs: i64,
    now: DateTime<Utc>,
) -> MemoryState {
    let mut next = state.clone();
    let q = quality.value();

    next.review_count += 1;
    next.total_time += response_time_secs;

    if quality.is_passing() {
        next.correct_count += 1;
        next.memory_strength = (next.memory_strength + STRENGTH_STEP * q as f64).min(1.0);
    } else {
        next.correct_count = 0;
        next.memory_strength = (next.memory_strength - STRENGTH_PENALTY).max(0.0);
    }

    if q < 4 {
        next.ease_factor = (next.ease_factor - EASE_PENALTY).max(MIN_EASE_FACTOR);
    } else if q > 4 {
        next.ease_factor = (next.ease_factor + EASE_BONUS).min(MAX_EASE_FACTOR);
    }

    next.interval_days = next_interval(next.review_count, next.ease_factor, quality);
    next.next_review = Some(days_from(now, next.interval_days));
    next.last_reviewed = Some(now);

    next.refresh_status();
    next
}
