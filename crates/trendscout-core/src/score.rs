//! Pure engagement scoring.
//!
//! The score rewards active engagement (shares, comments, quotes) over
//! passive volume (views), then adds a step-function recency bonus so a post
//! spiking *right now* outranks an older post with larger absolute counts.
//! No I/O and no hidden state: callers pass `now` explicitly, which keeps the
//! function deterministic under test.

use chrono::{DateTime, Utc};

use crate::policy::{
    COMMENT_WEIGHT, LIKE_WEIGHT, QUOTE_WEIGHT, RECENCY_FRESH_BONUS, RECENCY_FRESH_HOURS,
    RECENCY_SPIKE_BONUS, RECENCY_SPIKE_HOURS, SHARE_WEIGHT, VIEW_WEIGHT,
};
use crate::Engagement;

/// Computes the virality score for one post's engagement counters.
///
/// `score = round(w·counters) + recency_bonus(published_at, now)`, always a
/// non-negative integer. Weights live in [`crate::policy`].
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn engagement_score(
    engagement: &Engagement,
    published_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u64 {
    let weighted = LIKE_WEIGHT * engagement.likes as f64
        + SHARE_WEIGHT * engagement.shares as f64
        + COMMENT_WEIGHT * engagement.comments as f64
        + QUOTE_WEIGHT * engagement.quotes as f64
        + VIEW_WEIGHT * engagement.views as f64;

    (weighted.round().max(0.0) as u64).saturating_add(recency_bonus(published_at, now))
}

/// Step-function bonus for recent publication.
///
/// Large within the first [`RECENCY_SPIKE_HOURS`], smaller through
/// [`RECENCY_FRESH_HOURS`], zero beyond. A `published_at` in the future
/// (clock skew between provider and ingester) counts as "just published".
#[must_use]
pub fn recency_bonus(published_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let elapsed_hours = (now - published_at).num_hours().max(0);
    if elapsed_hours < RECENCY_SPIKE_HOURS {
        RECENCY_SPIKE_BONUS
    } else if elapsed_hours < RECENCY_FRESH_HOURS {
        RECENCY_FRESH_BONUS
    } else {
        0
    }
}
