//! Lookback-window dashboard rollups.
//!
//! Pure aggregation over the posts the caller fetched for the window; the
//! snapshot is computed fresh per request and never persisted. All tunables
//! are policy constants.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use trendscout_core::policy::{
    CATEGORY_DIVERSITY_CAP, CATEGORY_DIVERSITY_POINTS, ENGAGEMENT_NORM_DIVISOR,
    ENGAGEMENT_TERM_CAP, KEYWORD_COUNT, RECENCY_SPIKE_HOURS, RECENT_DENSITY_CAP,
    RECENT_DENSITY_DIVISOR, TIER_EXPLOSIVE_MIN, TIER_HIGH_MIN, TIER_MODERATE_MIN,
    TIMESERIES_BUCKETS, TREND_DIVERSITY_CAP, TREND_DIVERSITY_POINTS,
};
use trendscout_core::{Platform, Post};

use crate::classify::DEFAULT_CATEGORY;

/// Discrete engagement tier for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViralityTier {
    Explosive,
    High,
    Moderate,
    Low,
}

impl ViralityTier {
    /// Tier for an average engagement score.
    #[must_use]
    pub fn from_average(average: f64) -> Self {
        if average >= TIER_EXPLOSIVE_MIN {
            Self::Explosive
        } else if average >= TIER_HIGH_MIN {
            Self::High
        } else if average >= TIER_MODERATE_MIN {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explosive => "explosive",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStat {
    pub platform: Platform,
    pub posts: usize,
    pub total_engagement: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStat {
    pub category: String,
    pub posts: usize,
    pub total_engagement: u64,
    pub average_engagement: f64,
    pub tier: ViralityTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordStat {
    pub keyword: String,
    pub mentions: usize,
    /// Share of all hashtag mentions in the window, in `[0, 1]`.
    pub relevance: f64,
}

/// One hour-wide bucket of the engagement series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesBucket {
    pub bucket_start: DateTime<Utc>,
    pub posts: usize,
    pub engagement: u64,
}

/// The computed dashboard view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub lookback_hours: i64,
    pub total_posts: usize,
    pub platforms: Vec<PlatformStat>,
    pub categories: Vec<CategoryStat>,
    pub keywords: Vec<KeywordStat>,
    /// Most recent buckets first-to-last in chronological order, zero-filled.
    pub timeseries: Vec<TimeseriesBucket>,
    /// Composite 0-100 score for the whole window.
    pub virality_score: f64,
}

/// Aggregates one window of posts into the dashboard snapshot.
///
/// `trend_count` is the number of trend analyses produced for the same
/// window; it feeds the diversity term of the composite score.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn build_dashboard(
    posts: &[Post],
    trend_count: usize,
    lookback_hours: i64,
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let mut platform_stats: BTreeMap<Platform, (usize, u64)> = BTreeMap::new();
    let mut category_stats: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    let mut keyword_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut score_sum = 0u64;
    let mut recent_posts = 0usize;
    let recency_floor = now - Duration::hours(RECENCY_SPIKE_HOURS);

    for post in posts {
        let p = platform_stats.entry(post.platform).or_default();
        p.0 += 1;
        p.1 = p.1.saturating_add(post.engagement_score);

        let category = post
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
        let c = category_stats.entry(category).or_default();
        c.0 += 1;
        c.1 = c.1.saturating_add(post.engagement_score);

        for tag in &post.hashtags {
            *keyword_counts.entry(tag.clone()).or_default() += 1;
        }

        score_sum = score_sum.saturating_add(post.engagement_score);
        if post.published_at >= recency_floor {
            recent_posts += 1;
        }
    }

    let platforms: Vec<PlatformStat> = platform_stats
        .into_iter()
        .map(|(platform, (posts, total_engagement))| PlatformStat {
            platform,
            posts,
            total_engagement,
        })
        .collect();

    let mut categories: Vec<CategoryStat> = category_stats
        .into_iter()
        .map(|(category, (posts, total_engagement))| {
            let average_engagement = total_engagement as f64 / posts.max(1) as f64;
            CategoryStat {
                category,
                posts,
                total_engagement,
                average_engagement,
                tier: ViralityTier::from_average(average_engagement),
            }
        })
        .collect();
    categories.sort_by(|a, b| {
        b.total_engagement
            .cmp(&a.total_engagement)
            .then_with(|| a.category.cmp(&b.category))
    });

    let total_mentions: usize = keyword_counts.values().sum();
    let mut keywords: Vec<KeywordStat> = keyword_counts
        .into_iter()
        .map(|(keyword, mentions)| KeywordStat {
            keyword,
            mentions,
            relevance: if total_mentions == 0 {
                0.0
            } else {
                mentions as f64 / total_mentions as f64
            },
        })
        .collect();
    keywords.sort_by(|a, b| {
        b.mentions
            .cmp(&a.mentions)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    keywords.truncate(KEYWORD_COUNT);

    let timeseries = hourly_series(posts, now);

    let average_engagement = score_sum as f64 / posts.len().max(1) as f64;
    let engagement_term = (average_engagement / ENGAGEMENT_NORM_DIVISOR).min(ENGAGEMENT_TERM_CAP);
    let trend_term = (trend_count as f64 * TREND_DIVERSITY_POINTS).min(TREND_DIVERSITY_CAP);
    let category_term =
        (categories.len() as f64 * CATEGORY_DIVERSITY_POINTS).min(CATEGORY_DIVERSITY_CAP);
    let density_term = (recent_posts as f64 / RECENT_DENSITY_DIVISOR).min(RECENT_DENSITY_CAP);
    let virality_score = if posts.is_empty() {
        0.0
    } else {
        (engagement_term + trend_term + category_term + density_term).clamp(0.0, 100.0)
    };

    DashboardSnapshot {
        generated_at: now,
        lookback_hours,
        total_posts: posts.len(),
        platforms,
        categories,
        keywords,
        timeseries,
        virality_score,
    }
}

/// Fixed 1-hour buckets ending at the hour containing `now`, zero-filled.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn hourly_series(posts: &[Post], now: DateTime<Utc>) -> Vec<TimeseriesBucket> {
    let head_ts = now.timestamp() - now.timestamp().rem_euclid(3600);
    let head = Utc.timestamp_opt(head_ts, 0).single().unwrap_or(now);
    let first = head - Duration::hours(TIMESERIES_BUCKETS as i64 - 1);

    let mut buckets: Vec<TimeseriesBucket> = (0..TIMESERIES_BUCKETS)
        .map(|i| TimeseriesBucket {
            bucket_start: first + Duration::hours(i as i64),
            posts: 0,
            engagement: 0,
        })
        .collect();

    for post in posts {
        let offset = (post.published_at - first).num_hours();
        if offset < 0 {
            continue;
        }
        let Ok(index) = usize::try_from(offset) else {
            continue;
        };
        if let Some(bucket) = buckets.get_mut(index) {
            bucket.posts += 1;
            bucket.engagement = bucket.engagement.saturating_add(post.engagement_score);
        }
    }

    buckets
}
