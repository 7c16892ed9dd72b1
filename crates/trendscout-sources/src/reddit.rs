//! Reddit listing fetcher (client-credentials OAuth, cursor pagination).
//!
//! The bursty-paginated source: generous per-minute ceilings, large pages,
//! `after` cursors. Every page request first clears the budget tracker; 429
//! and transient failures retry the *same* page with capped back-off before
//! the source abandons with partial results.

use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use trendscout_core::score::engagement_score;
use trendscout_core::{Author, Engagement, Platform, Post};

use crate::backoff::{paginated_retriable, retry_with_backoff};
use crate::budget::{Acquire, SharedBudget};
use crate::collect::FetchOutcome;
use crate::error::SourceError;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Largest page the listing API serves.
const PAGE_LIMIT: usize = 100;
/// Guard against cycling cursors.
const MAX_PAGES: usize = 50;
/// Longest single sleep while waiting out a saturated window; the budget is
/// re-checked after each slice so cancellation is never wedged.
const MAX_RATE_WAIT: StdDuration = StdDuration::from_secs(30);
/// Budget re-checks before the fetch abandons with partial results.
const MAX_BUDGET_WAITS: u32 = 6;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<RawPost>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    data: RawPostData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPostData {
    id: String,
    title: String,
    selftext: String,
    author: String,
    subreddit: String,
    permalink: String,
    url: String,
    ups: i64,
    num_comments: i64,
    num_crossposts: i64,
    created_utc: f64,
    over_18: bool,
    stickied: bool,
    is_video: bool,
}

/// Connection settings for [`RedditSource`].
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    /// Listing to page through, e.g. `"popular"` for `/r/popular/hot`.
    pub feed: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

/// The paginated listing source.
pub struct RedditSource {
    client: reqwest::Client,
    api_base: String,
    token_url: String,
    config: RedditConfig,
    budget: SharedBudget,
}

impl RedditSource {
    /// Builds the source client. The token exchange happens lazily on the
    /// first fetch so construction never touches the network.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: RedditConfig, budget: SharedBudget) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.request_timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: REDDIT_API_BASE.to_owned(),
            token_url: REDDIT_TOKEN_URL.to_owned(),
            config,
            budget,
        })
    }

    /// Overrides the listing API base URL. Intended for tests against a mock
    /// server.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Overrides the token-exchange URL. Intended for tests against a mock
    /// server.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Fetches up to `max_posts` normalized posts from the configured feed.
    ///
    /// Pages are requested strictly in cursor order and never beyond the
    /// ceiling. The fetch ends cleanly on an absent cursor, an empty page, or
    /// the ceiling; it ends early, keeping partial results, when the budget
    /// stays saturated, the quota is exhausted, auth fails, or back-off is
    /// spent. The outcome carries whichever error ended it early.
    pub async fn fetch_posts(&self, max_posts: usize) -> FetchOutcome {
        if max_posts == 0 {
            return FetchOutcome::complete(Vec::new());
        }

        let token = match self.fetch_token().await {
            Ok(token) => token,
            Err(err) => return FetchOutcome::failed(err),
        };

        let mut posts: Vec<Post> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            pages += 1;
            if pages > MAX_PAGES {
                return FetchOutcome::partial(
                    posts,
                    SourceError::PaginationLimit {
                        platform: Platform::Reddit,
                        max_pages: MAX_PAGES,
                    },
                );
            }

            if let Err(err) = self.wait_for_budget().await {
                return FetchOutcome::partial(posts, err);
            }

            let listing = match self.fetch_page(&token, cursor.as_deref()).await {
                Ok(listing) => listing,
                Err(SourceError::Deserialize { context, source }) => {
                    // Malformed body: zero results for this call, not fatal.
                    tracing::warn!(
                        error = %source,
                        context,
                        "malformed Reddit listing page, stopping with partial results"
                    );
                    return FetchOutcome::complete(posts);
                }
                Err(err) => return FetchOutcome::partial(posts, err),
            };

            let item_count = listing.data.children.len();
            let discovered_at = Utc::now();
            for raw in listing.data.children {
                if let Some(post) = normalize_post(raw.data, discovered_at) {
                    posts.push(post);
                    if posts.len() >= max_posts {
                        tracing::debug!(pages, posts = posts.len(), "fetch hit the post ceiling");
                        return FetchOutcome::complete(posts);
                    }
                }
            }

            tracing::debug!(page = pages, items = item_count, "fetched Reddit listing page");

            cursor = listing.data.after;
            if item_count == 0 || cursor.is_none() {
                return FetchOutcome::complete(posts);
            }
        }
    }

    /// Clears one request with the budget tracker, sleeping out saturated
    /// windows in capped slices.
    async fn wait_for_budget(&self) -> Result<(), SourceError> {
        for _ in 0..MAX_BUDGET_WAITS {
            let decision = {
                let mut budget = self.budget.lock().await;
                let now = Utc::now();
                match budget.try_acquire(Platform::Reddit, now) {
                    Acquire::Allowed => {
                        budget.record_request(Platform::Reddit, now);
                        return Ok(());
                    }
                    denied => denied,
                }
            };

            match decision {
                Acquire::Allowed => {}
                Acquire::RateLimited { wait_until } => {
                    let wait = (wait_until - Utc::now())
                        .to_std()
                        .unwrap_or(StdDuration::ZERO)
                        .min(MAX_RATE_WAIT);
                    tracing::debug!(wait_secs = wait.as_secs(), "Reddit budget saturated");
                    tokio::time::sleep(wait).await;
                }
                Acquire::QuotaExhausted { reset_at } => {
                    return Err(SourceError::QuotaExhausted {
                        platform: Platform::Reddit,
                        reset_at,
                    });
                }
            }
        }

        Err(SourceError::RateLimited {
            platform: Platform::Reddit,
            retry_after_secs: MAX_RATE_WAIT.as_secs(),
        })
    }

    async fn fetch_token(&self) -> Result<String, SourceError> {
        let response = self
            .client
            .post(&self.token_url)
            .header("User-Agent", &self.config.user_agent)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Auth {
                platform: Platform::Reddit,
                reason: format!("token exchange failed with status {status}"),
            });
        }

        let body = response.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
                context: "Reddit token response".to_owned(),
                source: e,
            })?;
        Ok(token.access_token)
    }

    /// Fetches one listing page, retrying the same cursor on 429/5xx/transport.
    async fn fetch_page(&self, token: &str, cursor: Option<&str>) -> Result<Listing, SourceError> {
        let url = format!("{}/r/{}/hot", self.api_base, self.config.feed);

        retry_with_backoff(
            self.config.max_retries,
            self.config.backoff_base_ms,
            paginated_retriable,
            || {
                let url = url.clone();
                async move {
                    let mut params: Vec<(&str, String)> = vec![
                        ("limit", PAGE_LIMIT.to_string()),
                        ("raw_json", "1".to_string()),
                    ];
                    if let Some(cursor) = cursor {
                        params.push(("after", cursor.to_owned()));
                    }

                    let response = self
                        .client
                        .get(&url)
                        .header("Authorization", format!("Bearer {token}"))
                        .header("User-Agent", &self.config.user_agent)
                        .query(&params)
                        .send()
                        .await?;

                    let status = response.status();
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(SourceError::Auth {
                            platform: Platform::Reddit,
                            reason: format!("listing request rejected with status {status}"),
                        });
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after_secs = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(60);
                        return Err(SourceError::RateLimited {
                            platform: Platform::Reddit,
                            retry_after_secs,
                        });
                    }
                    if !status.is_success() {
                        return Err(SourceError::UnexpectedStatus {
                            status: status.as_u16(),
                            url,
                        });
                    }

                    let body = response.text().await?;
                    serde_json::from_str::<Listing>(&body).map_err(|e| SourceError::Deserialize {
                        context: "Reddit listing page".to_owned(),
                        source: e,
                    })
                }
            },
        )
        .await
    }
}

/// Maps one raw listing item into the canonical post shape.
///
/// Drops items that can never be useful downstream: missing id,
/// provider-flagged (NSFW), and pinned/administrative (stickied) entries.
/// Missing numerics become 0; `published_at` is clamped to `discovered_at`.
fn normalize_post(raw: RawPostData, discovered_at: DateTime<Utc>) -> Option<Post> {
    if raw.id.is_empty() || raw.over_18 || raw.stickied {
        return None;
    }

    let mut content = raw.title.trim().to_owned();
    let selftext = raw.selftext.trim();
    if !selftext.is_empty() {
        content.push_str("\n\n");
        content.push_str(selftext);
    }

    #[allow(clippy::cast_possible_truncation)]
    let published_at = Utc
        .timestamp_opt(raw.created_utc as i64, 0)
        .single()
        .unwrap_or(discovered_at)
        .min(discovered_at);

    let engagement = Engagement {
        likes: u64::try_from(raw.ups.max(0)).unwrap_or(0),
        shares: u64::try_from(raw.num_crossposts.max(0)).unwrap_or(0),
        comments: u64::try_from(raw.num_comments.max(0)).unwrap_or(0),
        quotes: 0,
        views: 0,
    };
    let score = engagement_score(&engagement, published_at, discovered_at);

    let url = if raw.permalink.starts_with('/') {
        format!("https://www.reddit.com{}", raw.permalink)
    } else if raw.permalink.is_empty() {
        raw.url.clone()
    } else {
        raw.permalink.clone()
    };

    let mut media_urls = Vec::new();
    if raw.is_video || is_media_url(&raw.url) {
        media_urls.push(raw.url.clone());
    }

    Some(Post {
        platform: Platform::Reddit,
        source_post_id: raw.id,
        author: Author {
            username: raw.author.clone(),
            display_name: raw.author,
            followers: 0,
        },
        hashtags: extract_hashtags(&content),
        mentions: Vec::new(),
        community: (!raw.subreddit.is_empty()).then_some(raw.subreddit),
        content,
        url,
        media_urls,
        engagement,
        engagement_score: score,
        published_at,
        discovered_at,
        category: None,
        sentiment: None,
    })
}

fn is_media_url(url: &str) -> bool {
    const MEDIA_SUFFIXES: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".mp4", ".webm"];
    let lower = url.to_lowercase();
    MEDIA_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
        || lower.contains("i.redd.it")
        || lower.contains("v.redd.it")
}

/// Pulls `#tag` tokens out of free text: lowercased, `#` stripped, order
/// preserved, duplicates removed.
fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let Some(stripped) = token.strip_prefix('#') else {
            continue;
        };
        let tag: String = stripped
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
