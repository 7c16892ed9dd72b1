//! Database operations for the `trend_analyses` table.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use trendscout_core::{Platform, Post};
use trendscout_trends::types::{
    ContentSuggestion, EngagementPattern, MediaMix, SentimentDistribution,
};
use trendscout_trends::TrendAnalysis;

use crate::DbError;

/// A row from the `trend_analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendAnalysisRow {
    pub id: i64,
    pub public_id: Uuid,
    pub group_key: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub platforms: Json<Vec<Platform>>,
    pub top_hashtags: Json<Vec<String>>,
    pub keywords: Json<Vec<String>>,
    pub engagement: Json<EngagementPattern>,
    pub media_mix: Json<MediaMix>,
    pub sentiment: Json<SentimentDistribution>,
    pub viral_score: f64,
    pub post_count: i32,
    pub sample_posts: Json<Vec<Post>>,
    pub suggestions: Json<Vec<ContentSuggestion>>,
    pub created_at: DateTime<Utc>,
}

impl TrendAnalysisRow {
    /// Converts the row back into the domain [`TrendAnalysis`].
    #[must_use]
    pub fn into_analysis(self) -> TrendAnalysis {
        TrendAnalysis {
            public_id: self.public_id,
            group_key: self.group_key,
            title: self.title,
            description: self.description,
            category: self.category,
            platforms: self.platforms.0,
            top_hashtags: self.top_hashtags.0,
            keywords: self.keywords.0,
            engagement: self.engagement.0,
            media_mix: self.media_mix.0,
            sentiment: self.sentiment.0,
            viral_score: self.viral_score,
            post_count: usize::try_from(self.post_count).unwrap_or(0),
            sample_posts: self.sample_posts.0,
            suggestions: self.suggestions.0,
            created_at: self.created_at,
        }
    }
}

/// Inserts a batch of freshly computed analyses.
///
/// Conflicts on `public_id` are skipped, so retrying a partially persisted
/// batch cannot double-insert. Per-item failures are logged and skipped.
/// Returns the number of rows actually inserted.
///
/// # Errors
///
/// Per-item failures surface only in the returned count; the `Result` keeps
/// the signature uniform with the other operations.
pub async fn insert_trend_analyses(
    pool: &PgPool,
    analyses: &[TrendAnalysis],
) -> Result<usize, DbError> {
    let mut inserted = 0usize;

    for analysis in analyses {
        let result = sqlx::query(
            "INSERT INTO trend_analyses \
               (public_id, group_key, title, description, category, platforms, \
                top_hashtags, keywords, engagement, media_mix, sentiment, \
                viral_score, post_count, sample_posts, suggestions, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                     $14, $15, $16) \
             ON CONFLICT (public_id) DO NOTHING",
        )
        .bind(analysis.public_id)
        .bind(&analysis.group_key)
        .bind(&analysis.title)
        .bind(&analysis.description)
        .bind(&analysis.category)
        .bind(Json(&analysis.platforms))
        .bind(Json(&analysis.top_hashtags))
        .bind(Json(&analysis.keywords))
        .bind(Json(&analysis.engagement))
        .bind(Json(&analysis.media_mix))
        .bind(Json(&analysis.sentiment))
        .bind(analysis.viral_score)
        .bind(i32::try_from(analysis.post_count).unwrap_or(i32::MAX))
        .bind(Json(&analysis.sample_posts))
        .bind(Json(&analysis.suggestions))
        .bind(analysis.created_at)
        .execute(pool)
        .await;

        match result {
            Ok(done) => inserted += usize::try_from(done.rows_affected()).unwrap_or(0),
            Err(e) => {
                tracing::warn!(
                    group = %analysis.group_key,
                    error = %e,
                    "trend analysis insert failed; continuing with the rest"
                );
            }
        }
    }

    Ok(inserted)
}

/// Returns the `limit` highest viral-score analyses, newest first on ties.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn top_trends(pool: &PgPool, limit: i64) -> Result<Vec<TrendAnalysisRow>, DbError> {
    let rows = sqlx::query_as::<_, TrendAnalysisRow>(
        "SELECT id, public_id, group_key, title, description, category, platforms, \
                top_hashtags, keywords, engagement, media_mix, sentiment, \
                viral_score, post_count, sample_posts, suggestions, created_at \
         FROM trend_analyses \
         ORDER BY viral_score DESC, created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Counts analyses created since `since`; feeds the dashboard's trend
/// diversity term.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_trend_count(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM trend_analyses WHERE created_at >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn row_round_trips_into_the_domain_analysis() {
        let created = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let row = TrendAnalysisRow {
            id: 1,
            public_id: Uuid::new_v4(),
            group_key: "rustlang".to_owned(),
            title: "Technology Trend: rustlang".to_owned(),
            description: "desc".to_owned(),
            category: "Technology".to_owned(),
            platforms: Json(vec![Platform::Reddit, Platform::X]),
            top_hashtags: Json(vec!["rustlang".to_owned()]),
            keywords: Json(vec!["rustlang".to_owned(), "compiler".to_owned()]),
            engagement: Json(EngagementPattern {
                total_likes: 50,
                total_shares: 5,
                total_comments: 12,
                total_quotes: 0,
                total_views: 900,
                average_score: 120.0,
                peak_hours: vec![9],
            }),
            media_mix: Json(MediaMix {
                text: 1.0,
                image: 0.0,
                video: 0.0,
            }),
            sentiment: Json(SentimentDistribution {
                positive: 0.5,
                negative: 0.0,
                neutral: 0.5,
            }),
            viral_score: 2.4,
            post_count: 4,
            sample_posts: Json(Vec::new()),
            suggestions: Json(Vec::new()),
            created_at: created,
        };

        let expected_id = row.public_id;
        let analysis = row.into_analysis();
        assert_eq!(analysis.public_id, expected_id);
        assert_eq!(analysis.platforms, vec![Platform::Reddit, Platform::X]);
        assert_eq!(analysis.post_count, 4);
        assert!((analysis.engagement.average_score - 120.0).abs() < f64::EPSILON);
    }
}
