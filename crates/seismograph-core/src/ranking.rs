//! Time-decayed "hotness" ranking for scored submissions.
//!
//! The decay term grows with age, so for equal scores an *older* post has
//! the higher rank value. The constant and the 7-digit rounding must stay
//! fixed so new values remain comparable with stored ones.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

/// Seconds of age worth one order of magnitude of score.
pub const HOT_DECAY_SECONDS: f64 = 45000.0;

const RANK_DECIMALS: i32 = 7;

/// Compute the hotness rank of `score` posted at `created_at`, as seen at `now`.
///
/// Age is truncated to whole seconds and clamped at zero, so a
/// `created_at` in the future behaves like age 0.
///
/// # Example
///
/// ```rust
/// use chrono::{Duration, Utc};
/// use seismograph_core::ranking::hotness;
///
/// let t = Utc::now();
/// assert_eq!(hotness(100, t, t), 2.0);
/// assert_eq!(hotness(100, t, t + Duration::seconds(45000)), 3.0);
/// ```
pub fn hotness(score: i64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let order = (score.unsigned_abs().max(1) as f64).log10();
    let sign = match score.cmp(&0) {
        Ordering::Greater => 1.0,
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
    };
    let age_seconds = (now - created_at).num_seconds().max(0) as f64;
    round_to(sign * order + age_seconds / HOT_DECAY_SECONDS, RANK_DECIMALS)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
