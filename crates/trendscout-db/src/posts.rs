//! Database operations for the `posts` table.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use trendscout_core::{Author, Engagement, Platform, Post};

use crate::DbError;

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub platform: String,
    pub source_post_id: String,
    pub author_username: String,
    pub author_display_name: String,
    pub author_followers: i64,
    pub content: String,
    pub url: String,
    pub community: Option<String>,
    pub media_urls: Json<Vec<String>>,
    pub hashtags: Json<Vec<String>>,
    pub mentions: Json<Vec<String>>,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub quotes: i64,
    pub views: i64,
    pub engagement_score: i64,
    pub published_at: DateTime<Utc>,
    pub discovered_at: DateTime<Utc>,
    pub category: Option<String>,
    pub sentiment: Option<String>,
}

impl PostRow {
    /// Converts the row back into the domain [`Post`].
    ///
    /// # Errors
    ///
    /// Returns the offending value if the stored platform is unknown.
    pub fn into_post(self) -> Result<Post, String> {
        let platform: Platform = self.platform.parse()?;
        Ok(Post {
            platform,
            source_post_id: self.source_post_id,
            author: Author {
                username: self.author_username,
                display_name: self.author_display_name,
                followers: from_db(self.author_followers),
            },
            content: self.content,
            url: self.url,
            community: self.community,
            media_urls: self.media_urls.0,
            hashtags: self.hashtags.0,
            mentions: self.mentions.0,
            engagement: Engagement {
                likes: from_db(self.likes),
                shares: from_db(self.shares),
                comments: from_db(self.comments),
                quotes: from_db(self.quotes),
                views: from_db(self.views),
            },
            engagement_score: from_db(self.engagement_score),
            published_at: self.published_at,
            discovered_at: self.discovered_at,
            category: self.category,
            sentiment: self.sentiment.and_then(|s| s.parse().ok()),
        })
    }
}

// Counters are u64 in the domain and BIGINT in the schema; clamp rather than
// fail on the (theoretical) overflow in either direction.
fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Upserts a batch of posts keyed on `(platform, source_post_id)`.
///
/// Rediscovered posts refresh their counters, score, and classification;
/// `discovered_at` keeps its original value. Per-item failures are logged and
/// skipped so one bad post cannot sink the batch. Returns the number of rows
/// actually written.
///
/// # Errors
///
/// Per-item failures surface only in the returned count; the `Result` keeps
/// the signature uniform with the other operations.
pub async fn upsert_posts(pool: &PgPool, posts: &[Post]) -> Result<usize, DbError> {
    let mut written = 0usize;

    for post in posts {
        let result = sqlx::query(
            "INSERT INTO posts \
               (platform, source_post_id, author_username, author_display_name, \
                author_followers, content, url, community, media_urls, hashtags, \
                mentions, likes, shares, comments, quotes, views, engagement_score, \
                published_at, discovered_at, category, sentiment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                     $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (platform, source_post_id) DO UPDATE SET \
               likes            = EXCLUDED.likes, \
               shares           = EXCLUDED.shares, \
               comments         = EXCLUDED.comments, \
               quotes           = EXCLUDED.quotes, \
               views            = EXCLUDED.views, \
               engagement_score = EXCLUDED.engagement_score, \
               author_followers = EXCLUDED.author_followers, \
               category         = COALESCE(EXCLUDED.category, posts.category), \
               sentiment        = COALESCE(EXCLUDED.sentiment, posts.sentiment), \
               updated_at       = NOW()",
        )
        .bind(post.platform.as_str())
        .bind(&post.source_post_id)
        .bind(&post.author.username)
        .bind(&post.author.display_name)
        .bind(to_db(post.author.followers))
        .bind(&post.content)
        .bind(&post.url)
        .bind(post.community.as_deref())
        .bind(Json(&post.media_urls))
        .bind(Json(&post.hashtags))
        .bind(Json(&post.mentions))
        .bind(to_db(post.engagement.likes))
        .bind(to_db(post.engagement.shares))
        .bind(to_db(post.engagement.comments))
        .bind(to_db(post.engagement.quotes))
        .bind(to_db(post.engagement.views))
        .bind(to_db(post.engagement_score))
        .bind(post.published_at)
        .bind(post.discovered_at)
        .bind(post.category.as_deref())
        .bind(post.sentiment.map(trendscout_core::Sentiment::as_str))
        .execute(pool)
        .await;

        match result {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::warn!(
                    post = %post.identity(),
                    error = %e,
                    "post upsert failed; continuing with the rest of the batch"
                );
            }
        }
    }

    Ok(written)
}

/// Returns which of `ids` already exist for `platform`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn known_post_ids(
    pool: &PgPool,
    platform: Platform,
    ids: &[String],
) -> Result<HashSet<String>, DbError> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows = sqlx::query_scalar::<_, String>(
        "SELECT source_post_id FROM posts \
         WHERE platform = $1 AND source_post_id = ANY($2)",
    )
    .bind(platform.as_str())
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Returns all posts published since `since`, most recent first.
///
/// Rows with values the domain model cannot represent are logged and skipped.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_posts(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<Post>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(
        "SELECT platform, source_post_id, author_username, author_display_name, \
                author_followers, content, url, community, media_urls, hashtags, \
                mentions, likes, shares, comments, quotes, views, engagement_score, \
                published_at, discovered_at, category, sentiment \
         FROM posts \
         WHERE published_at >= $1 \
         ORDER BY published_at DESC, id DESC",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_post() {
            Ok(post) => posts.push(post),
            Err(value) => {
                tracing::warn!(value, "skipping post row with unknown platform");
            }
        }
    }
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn row_round_trips_into_the_domain_post() {
        let published = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let row = PostRow {
            platform: "reddit".to_owned(),
            source_post_id: "t3_abc".to_owned(),
            author_username: "poster".to_owned(),
            author_display_name: "Poster".to_owned(),
            author_followers: 42,
            content: "content".to_owned(),
            url: "https://reddit.com/t3_abc".to_owned(),
            community: Some("r/rust".to_owned()),
            media_urls: Json(vec!["https://i.redd.it/x.png".to_owned()]),
            hashtags: Json(vec!["rust".to_owned()]),
            mentions: Json(Vec::new()),
            likes: 10,
            shares: 2,
            comments: 3,
            quotes: 0,
            views: 0,
            engagement_score: 22,
            published_at: published,
            discovered_at: published,
            category: Some("Technology".to_owned()),
            sentiment: Some("positive".to_owned()),
        };

        let post = row.into_post().unwrap();
        assert_eq!(post.platform, Platform::Reddit);
        assert_eq!(post.engagement.likes, 10);
        assert_eq!(post.author.followers, 42);
        assert_eq!(post.sentiment, Some(trendscout_core::Sentiment::Positive));
        assert_eq!(post.hashtags, vec!["rust".to_owned()]);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let published = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let row = PostRow {
            platform: "myspace".to_owned(),
            source_post_id: "1".to_owned(),
            author_username: String::new(),
            author_display_name: String::new(),
            author_followers: 0,
            content: String::new(),
            url: String::new(),
            community: None,
            media_urls: Json(Vec::new()),
            hashtags: Json(Vec::new()),
            mentions: Json(Vec::new()),
            likes: 0,
            shares: 0,
            comments: 0,
            quotes: 0,
            views: 0,
            engagement_score: 0,
            published_at: published,
            discovered_at: published,
            category: None,
            sentiment: None,
        };

        assert!(row.into_post().is_err());
    }

    #[test]
    fn counter_clamping_never_panics() {
        assert_eq!(to_db(u64::MAX), i64::MAX);
        assert_eq!(from_db(-5), 0);
        assert_eq!(from_db(7), 7);
    }
}
