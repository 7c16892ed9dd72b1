//! X recent-search fetcher (single request per invocation).
//!
//! The quota-limited source: one search per rolling window and a small
//! monthly cap, so every invocation issues exactly one request asking for the
//! richest field set and the largest page, then keeps only the top-scored
//! slice. A 429 is never blindly retried; a usage-cap 429 marks the whole
//! period exhausted in the budget tracker.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use trendscout_core::score::engagement_score;
use trendscout_core::{Author, Engagement, Platform, Post};

use crate::backoff::{retry_with_backoff, single_shot_retriable};
use crate::budget::{next_period_start, Acquire, SharedBudget};
use crate::collect::FetchOutcome;
use crate::error::SourceError;

const X_API_BASE: &str = "https://api.x.com";

/// Largest page the recent-search endpoint serves.
const MAX_RESULTS: usize = 100;
/// Kept after score-sorting: quality over quantity, calls are expensive.
const TOP_N: usize = 25;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    data: Vec<RawTweet>,
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Includes {
    users: Vec<RawUser>,
    media: Vec<RawMedia>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTweet {
    id: String,
    text: String,
    author_id: String,
    created_at: Option<DateTime<Utc>>,
    public_metrics: TweetMetrics,
    entities: Entities,
    attachments: Attachments,
    possibly_sensitive: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TweetMetrics {
    retweet_count: u64,
    reply_count: u64,
    like_count: u64,
    quote_count: u64,
    bookmark_count: u64,
    impression_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Entities {
    hashtags: Vec<TagEntity>,
    mentions: Vec<MentionEntity>,
}

#[derive(Debug, Deserialize)]
struct TagEntity {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct MentionEntity {
    username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Attachments {
    media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUser {
    id: String,
    username: String,
    name: String,
    public_metrics: UserMetrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserMetrics {
    followers_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMedia {
    media_key: String,
    url: Option<String>,
    preview_image_url: Option<String>,
}

/// Connection settings for [`XSource`].
#[derive(Debug, Clone)]
pub struct XConfig {
    pub bearer_token: String,
    pub search_query: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

/// The single-shot quota-limited source.
pub struct XSource {
    client: reqwest::Client,
    api_base: String,
    config: XConfig,
    budget: SharedBudget,
}

impl XSource {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: XConfig, budget: SharedBudget) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.request_timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: X_API_BASE.to_owned(),
            config,
            budget,
        })
    }

    /// Overrides the API base URL. Intended for tests against a mock server.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Issues at most one search and returns the top-scored posts.
    ///
    /// The budget is consulted once: a saturated window or spent quota skips
    /// the request entirely and reports why. After a successful search the
    /// results are scored, sorted descending, and truncated to
    /// `min(TOP_N, max_posts)`.
    pub async fn fetch_posts(&self, max_posts: usize) -> FetchOutcome {
        if max_posts == 0 {
            return FetchOutcome::complete(Vec::new());
        }

        {
            let mut budget = self.budget.lock().await;
            let now = Utc::now();
            match budget.try_acquire(Platform::X, now) {
                Acquire::Allowed => budget.record_request(Platform::X, now),
                Acquire::RateLimited { wait_until } => {
                    return FetchOutcome::failed(SourceError::RateLimited {
                        platform: Platform::X,
                        retry_after_secs: secs_until(wait_until, now),
                    });
                }
                Acquire::QuotaExhausted { reset_at } => {
                    return FetchOutcome::failed(SourceError::QuotaExhausted {
                        platform: Platform::X,
                        reset_at,
                    });
                }
            }
        }

        match self.search().await {
            Ok(response) => {
                let discovered_at = Utc::now();
                let mut posts = normalize_response(response, discovered_at);
                posts.sort_by(|a, b| b.engagement_score.cmp(&a.engagement_score));
                posts.truncate(TOP_N.min(max_posts));
                tracing::debug!(kept = posts.len(), "X search completed");
                FetchOutcome::complete(posts)
            }
            Err(SourceError::QuotaExhausted { platform, reset_at }) => {
                self.budget
                    .lock()
                    .await
                    .record_quota_exhausted(Platform::X, reset_at);
                FetchOutcome::failed(SourceError::QuotaExhausted { platform, reset_at })
            }
            Err(SourceError::Deserialize { context, source }) => {
                // Malformed body: zero results for this call, not fatal.
                tracing::warn!(error = %source, context, "malformed X search response");
                FetchOutcome::complete(Vec::new())
            }
            Err(err) => FetchOutcome::failed(err),
        }
    }

    /// One recent-search request with the richest field set. Transport and
    /// 5xx failures retry with back-off; 429 is classified and returned.
    async fn search(&self) -> Result<SearchResponse, SourceError> {
        let url = format!("{}/2/tweets/search/recent", self.api_base);

        retry_with_backoff(
            self.config.max_retries,
            self.config.backoff_base_ms,
            single_shot_retriable,
            || {
                let url = url.clone();
                async move {
                    let params: Vec<(&str, String)> = vec![
                        ("query", self.config.search_query.clone()),
                        ("max_results", MAX_RESULTS.to_string()),
                        (
                            "tweet.fields",
                            "created_at,public_metrics,entities,attachments,possibly_sensitive"
                                .to_owned(),
                        ),
                        ("expansions", "author_id,attachments.media_keys".to_owned()),
                        ("user.fields", "username,name,public_metrics".to_owned()),
                        ("media.fields", "url,preview_image_url,type".to_owned()),
                    ];

                    let response = self
                        .client
                        .get(&url)
                        .bearer_auth(&self.config.bearer_token)
                        .query(&params)
                        .send()
                        .await?;

                    let status = response.status();
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(SourceError::Auth {
                            platform: Platform::X,
                            reason: format!("search request rejected with status {status}"),
                        });
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let headers = response.headers().clone();
                        return Err(classify_429(&headers, response).await);
                    }
                    if !status.is_success() {
                        return Err(SourceError::UnexpectedStatus {
                            status: status.as_u16(),
                            url,
                        });
                    }

                    let body = response.text().await?;
                    serde_json::from_str::<SearchResponse>(&body).map_err(|e| {
                        SourceError::Deserialize {
                            context: "X search response".to_owned(),
                            source: e,
                        }
                    })
                }
            },
        )
        .await
    }
}

fn secs_until(wait_until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((wait_until - now).num_seconds()).unwrap_or(0)
}

/// Splits a 429 into the two distinct failure kinds.
///
/// A usage-cap body means the monthly quota is spent: blocked until the
/// provider reset (`x-rate-limit-reset`), or conservatively the first of next
/// month when the header is absent. Anything else is an ordinary
/// rolling-window rate limit.
async fn classify_429(
    headers: &reqwest::header::HeaderMap,
    response: reqwest::Response,
) -> SourceError {
    let reset_at = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single());

    let now = Utc::now();
    let body = response.text().await.unwrap_or_default();
    if body.contains("UsageCapExceeded") {
        return SourceError::QuotaExhausted {
            platform: Platform::X,
            reset_at: reset_at.unwrap_or_else(|| next_period_start(now)),
        };
    }

    let retry_after_secs = reset_at.map_or(900, |t| secs_until(t, now));
    SourceError::RateLimited {
        platform: Platform::X,
        retry_after_secs,
    }
}

fn normalize_response(response: SearchResponse, discovered_at: DateTime<Utc>) -> Vec<Post> {
    let users: HashMap<&str, &RawUser> = response
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u))
        .collect();
    let media: HashMap<&str, &RawMedia> = response
        .includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();

    response
        .data
        .into_iter()
        .filter_map(|raw| normalize_tweet(raw, &users, &media, discovered_at))
        .collect()
}

/// Maps one raw tweet into the canonical post shape.
///
/// Drops items without an id and provider-flagged (possibly sensitive)
/// entries. Quote and bookmark counts fold into the single `quotes` counter.
fn normalize_tweet(
    raw: RawTweet,
    users: &HashMap<&str, &RawUser>,
    media: &HashMap<&str, &RawMedia>,
    discovered_at: DateTime<Utc>,
) -> Option<Post> {
    if raw.id.is_empty() || raw.possibly_sensitive {
        return None;
    }

    let author = users.get(raw.author_id.as_str());
    let username = author.map(|u| u.username.clone()).unwrap_or_default();
    let display_name = author.map(|u| u.name.clone()).unwrap_or_default();
    let followers = author.map_or(0, |u| u.public_metrics.followers_count);

    let url = if username.is_empty() {
        format!("https://x.com/i/web/status/{}", raw.id)
    } else {
        format!("https://x.com/{username}/status/{}", raw.id)
    };

    let published_at = raw.created_at.unwrap_or(discovered_at).min(discovered_at);

    let engagement = Engagement {
        likes: raw.public_metrics.like_count,
        shares: raw.public_metrics.retweet_count,
        comments: raw.public_metrics.reply_count,
        quotes: raw
            .public_metrics
            .quote_count
            .saturating_add(raw.public_metrics.bookmark_count),
        views: raw.public_metrics.impression_count,
    };
    let score = engagement_score(&engagement, published_at, discovered_at);

    let mut hashtags: Vec<String> = Vec::new();
    for entity in &raw.entities.hashtags {
        let tag = entity.tag.to_lowercase();
        if !tag.is_empty() && !hashtags.contains(&tag) {
            hashtags.push(tag);
        }
    }
    let mentions: Vec<String> = raw
        .entities
        .mentions
        .iter()
        .map(|m| m.username.clone())
        .collect();

    let media_urls: Vec<String> = raw
        .attachments
        .media_keys
        .iter()
        .filter_map(|key| media.get(key.as_str()))
        .filter_map(|m| m.url.clone().or_else(|| m.preview_image_url.clone()))
        .collect();

    Some(Post {
        platform: Platform::X,
        source_post_id: raw.id,
        author: Author {
            username,
            display_name,
            followers,
        },
        content: raw.text,
        url,
        community: None,
        media_urls,
        hashtags,
        mentions,
        engagement,
        engagement_score: score,
        published_at,
        discovered_at,
        category: None,
        sentiment: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn sample_response() -> SearchResponse {
        let json = serde_json::json!({
            "data": [{
                "id": "1900000000000000001",
                "text": "Quantum toasters are real now #Tech #AI",
                "author_id": "u1",
                "created_at": "2026-03-10T10:30:00Z",
                "public_metrics": {
                    "retweet_count": 40,
                    "reply_count": 12,
                    "like_count": 300,
                    "quote_count": 5,
                    "bookmark_count": 7,
                    "impression_count": 90000
                },
                "entities": {
                    "hashtags": [{"tag": "Tech"}, {"tag": "AI"}, {"tag": "tech"}],
                    "mentions": [{"username": "toastlab"}]
                },
                "attachments": {"media_keys": ["m1"]}
            }],
            "includes": {
                "users": [{
                    "id": "u1",
                    "username": "gadgeteer",
                    "name": "The Gadgeteer",
                    "public_metrics": {"followers_count": 52000}
                }],
                "media": [{
                    "media_key": "m1",
                    "preview_image_url": "https://pbs.example/m1.jpg"
                }]
            }
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn normalizes_metrics_author_and_entities() {
        let posts = normalize_response(sample_response(), now());
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.platform, Platform::X);
        assert_eq!(post.author.username, "gadgeteer");
        assert_eq!(post.author.followers, 52000);
        assert_eq!(post.engagement.likes, 300);
        assert_eq!(post.engagement.shares, 40);
        assert_eq!(post.engagement.comments, 12);
        assert_eq!(post.engagement.quotes, 12, "quotes fold in bookmarks");
        assert_eq!(post.engagement.views, 90000);
        assert_eq!(post.hashtags, vec!["tech", "ai"]);
        assert_eq!(post.mentions, vec!["toastlab"]);
        assert_eq!(post.media_urls, vec!["https://pbs.example/m1.jpg"]);
        assert_eq!(post.url, "https://x.com/gadgeteer/status/1900000000000000001");
    }

    #[test]
    fn sensitive_tweets_are_dropped() {
        let mut response = sample_response();
        response.data[0].possibly_sensitive = true;
        assert!(normalize_response(response, now()).is_empty());
    }

    #[test]
    fn unknown_author_falls_back_to_web_status_url() {
        let mut response = sample_response();
        response.includes.users.clear();
        let posts = normalize_response(response, now());
        assert_eq!(
            posts[0].url,
            "https://x.com/i/web/status/1900000000000000001"
        );
        assert!(posts[0].author.username.is_empty());
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let json = serde_json::json!({
            "data": [{"id": "9", "text": "bare tweet", "author_id": "nobody"}]
        });
        let response: SearchResponse = serde_json::from_value(json).unwrap();
        let posts = normalize_response(response, now());
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].engagement, Engagement::default());
    }
}
