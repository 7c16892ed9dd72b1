//! Central policy constants for scoring, quality, clustering, and dashboards.
//!
//! Every threshold that shapes what counts as "viral" lives here rather than
//! inline at its point of use, so the quality bar can be audited and tuned in
//! one place and each rule tested in isolation.

// ---------------------------------------------------------------------------
// Engagement scoring
// ---------------------------------------------------------------------------

/// Weight for likes/upvotes, the cheapest active signal.
pub const LIKE_WEIGHT: f64 = 1.0;

/// Weight for shares (retweets, crossposts), the deepest reach signal.
pub const SHARE_WEIGHT: f64 = 3.0;

/// Weight for comments/replies.
pub const COMMENT_WEIGHT: f64 = 2.0;

/// Weight for quotes and bookmarks.
pub const QUOTE_WEIGHT: f64 = 2.5;

/// Weight for views/impressions; passive and far below active signals.
pub const VIEW_WEIGHT: f64 = 0.01;

/// A post published within this many hours is treated as actively spiking.
pub const RECENCY_SPIKE_HOURS: i64 = 3;

/// Bonus for posts inside the spike window.
pub const RECENCY_SPIKE_BONUS: u64 = 400;

/// A post published within this many hours still earns a smaller bonus.
pub const RECENCY_FRESH_HOURS: i64 = 12;

/// Bonus for posts inside the fresh window (but past the spike window).
pub const RECENCY_FRESH_BONUS: u64 = 150;

// ---------------------------------------------------------------------------
// Quality filter
// ---------------------------------------------------------------------------

/// Minimum content length, in characters, for a post to be considered.
pub const MIN_CONTENT_CHARS: usize = 10;

/// Author names that mark a post as having no valid author.
pub const INVALID_AUTHORS: &[&str] = &["", "[deleted]", "[removed]", "automoderator"];

// ---------------------------------------------------------------------------
// Trend clustering
// ---------------------------------------------------------------------------

/// Groups smaller than this are dropped unless no group qualifies.
pub const MIN_GROUP_SIZE: usize = 2;

/// When no group reaches [`MIN_GROUP_SIZE`], keep this many largest groups so
/// a non-empty input never yields zero trends.
pub const FALLBACK_GROUP_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Trend summaries
// ---------------------------------------------------------------------------

/// Ranked hashtags retained per trend.
pub const TOP_HASHTAG_COUNT: usize = 10;

/// Keywords retained per trend.
pub const KEYWORD_COUNT: usize = 15;

/// Sample posts embedded in a trend analysis.
pub const SAMPLE_POST_COUNT: usize = 5;

/// Peak-activity hour buckets reported per trend.
pub const PEAK_HOUR_COUNT: usize = 3;

/// Average-engagement points per viral-score point; the score caps at 100.
pub const VIRAL_SCORE_DIVISOR: f64 = 50.0;

// ---------------------------------------------------------------------------
// Dashboard aggregation
// ---------------------------------------------------------------------------

/// Cap on the normalized average-engagement term of the composite score.
pub const ENGAGEMENT_TERM_CAP: f64 = 50.0;

/// Average engagement points per composite-score point.
pub const ENGAGEMENT_NORM_DIVISOR: f64 = 40.0;

/// Composite-score points per distinct trend group, and the term's cap.
pub const TREND_DIVERSITY_POINTS: f64 = 4.0;
pub const TREND_DIVERSITY_CAP: f64 = 20.0;

/// Composite-score points per distinct category, and the term's cap.
pub const CATEGORY_DIVERSITY_POINTS: f64 = 3.0;
pub const CATEGORY_DIVERSITY_CAP: f64 = 15.0;

/// Posts-per-point divisor for the recent-activity term, and the term's cap.
pub const RECENT_DENSITY_DIVISOR: f64 = 4.0;
pub const RECENT_DENSITY_CAP: f64 = 15.0;

/// Hour-wide buckets reported in the engagement time series.
pub const TIMESERIES_BUCKETS: usize = 24;

/// Average-engagement thresholds for the discrete virality tiers.
pub const TIER_EXPLOSIVE_MIN: f64 = 2000.0;
pub const TIER_HIGH_MIN: f64 = 750.0;
pub const TIER_MODERATE_MIN: f64 = 200.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_signals_outweigh_views() {
        assert!(SHARE_WEIGHT > LIKE_WEIGHT);
        assert!(COMMENT_WEIGHT > LIKE_WEIGHT);
        assert!(VIEW_WEIGHT < 0.1, "views must stay a fractional signal");
    }

    #[test]
    fn recency_steps_decrease() {
        assert!(RECENCY_SPIKE_HOURS < RECENCY_FRESH_HOURS);
        assert!(RECENCY_SPIKE_BONUS > RECENCY_FRESH_BONUS);
    }

    #[test]
    fn dashboard_terms_cannot_exceed_scale() {
        let max =
            ENGAGEMENT_TERM_CAP + TREND_DIVERSITY_CAP + CATEGORY_DIVERSITY_CAP + RECENT_DENSITY_CAP;
        assert!(max <= 100.0, "composite caps must fit the 0-100 scale");
    }

    #[test]
    fn tier_thresholds_are_ordered() {
        assert!(TIER_EXPLOSIVE_MIN > TIER_HIGH_MIN);
        assert!(TIER_HIGH_MIN > TIER_MODERATE_MIN);
        assert!(TIER_MODERATE_MIN > 0.0);
    }
}
