//! Concurrent fan-out over the configured sources.
//!
//! Continues past individual source failures: every source yields a
//! [`FetchOutcome`] whose posts are merged regardless, and a per-source
//! [`SourceReport`] records what happened for the run summary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use trendscout_core::{AppConfig, Platform, Post};

use crate::budget::SharedBudget;
use crate::error::SourceError;
use crate::reddit::{RedditConfig, RedditSource};
use crate::twitter::{XConfig, XSource};

const SOURCE_CONCURRENCY: usize = 2;

/// What one source produced: possibly posts, possibly an error, often both.
///
/// A fetch that fails mid-pagination still returns the pages it already
/// normalized, so `posts` and `error` are independent.
#[derive(Debug)]
pub struct FetchOutcome {
    pub posts: Vec<Post>,
    pub error: Option<SourceError>,
}

impl FetchOutcome {
    #[must_use]
    pub fn complete(posts: Vec<Post>) -> Self {
        Self { posts, error: None }
    }

    #[must_use]
    pub fn partial(posts: Vec<Post>, error: SourceError) -> Self {
        Self {
            posts,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn failed(error: SourceError) -> Self {
        Self {
            posts: Vec::new(),
            error: Some(error),
        }
    }
}

/// Terminal state of one source within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    RateLimited,
    QuotaExhausted,
    AuthFailed,
    TransportFailed,
    Skipped,
}

/// Per-source summary surfaced in run results and API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub platform: Platform,
    pub fetched: usize,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

impl SourceReport {
    fn from_outcome(platform: Platform, outcome: &FetchOutcome) -> Self {
        let fetched = outcome.posts.len();
        let Some(err) = &outcome.error else {
            return Self {
                platform,
                fetched,
                status: SourceStatus::Ok,
                detail: None,
                retry_after_secs: None,
                reset_at: None,
            };
        };

        let status = match err {
            SourceError::Auth { .. } => SourceStatus::AuthFailed,
            SourceError::RateLimited { .. } => SourceStatus::RateLimited,
            SourceError::QuotaExhausted { .. } => SourceStatus::QuotaExhausted,
            SourceError::Http(_)
            | SourceError::UnexpectedStatus { .. }
            | SourceError::Deserialize { .. }
            | SourceError::PaginationLimit { .. } => SourceStatus::TransportFailed,
        };
        let retry_after_secs = match err {
            SourceError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };
        let reset_at = match err {
            SourceError::QuotaExhausted { reset_at, .. } => Some(*reset_at),
            _ => None,
        };

        Self {
            platform,
            fetched,
            status,
            detail: Some(err.to_string()),
            retry_after_secs,
            reset_at,
        }
    }

    fn skipped(platform: Platform) -> Self {
        Self {
            platform,
            fetched: 0,
            status: SourceStatus::Skipped,
            detail: Some("credentials not configured".to_owned()),
            retry_after_secs: None,
            reset_at: None,
        }
    }
}

/// The sources a deployment has credentials for. Unconfigured sources are
/// skipped, not errors.
pub struct SourceSet {
    pub reddit: Option<RedditSource>,
    pub x: Option<XSource>,
}

impl SourceSet {
    /// Builds fetchers for every source whose credentials are present.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if an HTTP client cannot be constructed.
    pub fn from_app_config(
        config: &AppConfig,
        budget: &SharedBudget,
    ) -> Result<Self, SourceError> {
        let reddit = match (&config.reddit_client_id, &config.reddit_client_secret) {
            (Some(client_id), Some(client_secret)) => Some(RedditSource::new(
                RedditConfig {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    user_agent: config.reddit_user_agent.clone(),
                    feed: config.reddit_feed.clone(),
                    request_timeout_secs: config.source_request_timeout_secs,
                    max_retries: config.source_max_retries,
                    backoff_base_ms: config.source_backoff_base_ms,
                },
                Arc::clone(budget),
            )?),
            _ => None,
        };

        let x = match &config.x_bearer_token {
            Some(bearer_token) => Some(XSource::new(
                XConfig {
                    bearer_token: bearer_token.clone(),
                    search_query: config.x_search_query.clone(),
                    request_timeout_secs: config.source_request_timeout_secs,
                    max_retries: config.source_max_retries,
                    backoff_base_ms: config.source_backoff_base_ms,
                },
                Arc::clone(budget),
            )?),
            None => None,
        };

        Ok(Self { reddit, x })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reddit.is_none() && self.x.is_none()
    }
}

/// Merged result of one collection pass.
#[derive(Debug)]
pub struct CollectedPosts {
    pub posts: Vec<Post>,
    pub reports: Vec<SourceReport>,
}

type SourceTask<'a> = Pin<Box<dyn Future<Output = (Platform, FetchOutcome)> + Send + 'a>>;

/// Fetches from every configured source concurrently and merges the results.
///
/// Returns an empty post list (with the reports explaining why) if all
/// sources fail. Reports come back in platform declaration order.
pub async fn collect_posts(sources: &SourceSet, max_posts_per_source: usize) -> CollectedPosts {
    let mut tasks: Vec<SourceTask<'_>> = Vec::new();
    let mut reports: Vec<SourceReport> = Vec::new();

    if let Some(reddit) = &sources.reddit {
        tasks.push(Box::pin(async move {
            (Platform::Reddit, reddit.fetch_posts(max_posts_per_source).await)
        }));
    } else {
        reports.push(SourceReport::skipped(Platform::Reddit));
    }

    if let Some(x) = &sources.x {
        tasks.push(Box::pin(async move {
            (Platform::X, x.fetch_posts(max_posts_per_source).await)
        }));
    } else {
        reports.push(SourceReport::skipped(Platform::X));
    }

    let outcomes: Vec<(Platform, FetchOutcome)> = stream::iter(tasks)
        .buffer_unordered(SOURCE_CONCURRENCY)
        .collect()
        .await;

    let mut posts = Vec::new();
    for (platform, outcome) in outcomes {
        match &outcome.error {
            None => tracing::debug!(
                platform = %platform,
                count = outcome.posts.len(),
                "collected posts"
            ),
            Some(e) => tracing::warn!(
                platform = %platform,
                count = outcome.posts.len(),
                error = %e,
                "source degraded"
            ),
        }
        reports.push(SourceReport::from_outcome(platform, &outcome));
        posts.extend(outcome.posts);
    }

    reports.sort_by_key(|r| platform_rank(r.platform));
    CollectedPosts { posts, reports }
}

fn platform_rank(platform: Platform) -> usize {
    Platform::all()
        .iter()
        .position(|p| *p == platform)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // --- report mapping ---

    #[test]
    fn ok_outcome_reports_ok() {
        let report = SourceReport::from_outcome(Platform::Reddit, &FetchOutcome::complete(vec![]));
        assert_eq!(report.status, SourceStatus::Ok);
        assert_eq!(report.fetched, 0);
        assert!(report.detail.is_none());
    }

    #[test]
    fn rate_limit_report_carries_wait() {
        let outcome = FetchOutcome::failed(SourceError::RateLimited {
            platform: Platform::X,
            retry_after_secs: 840,
        });
        let report = SourceReport::from_outcome(Platform::X, &outcome);
        assert_eq!(report.status, SourceStatus::RateLimited);
        assert_eq!(report.retry_after_secs, Some(840));
        assert!(report.reset_at.is_none());
    }

    #[test]
    fn quota_report_carries_reset() {
        let reset_at = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let outcome = FetchOutcome::failed(SourceError::QuotaExhausted {
            platform: Platform::X,
            reset_at,
        });
        let report = SourceReport::from_outcome(Platform::X, &outcome);
        assert_eq!(report.status, SourceStatus::QuotaExhausted);
        assert_eq!(report.reset_at, Some(reset_at));
    }

    #[test]
    fn auth_failure_maps_to_auth_failed() {
        let outcome = FetchOutcome::failed(SourceError::Auth {
            platform: Platform::Reddit,
            reason: "token request rejected".to_owned(),
        });
        let report = SourceReport::from_outcome(Platform::Reddit, &outcome);
        assert_eq!(report.status, SourceStatus::AuthFailed);
        assert!(report.detail.as_deref().is_some_and(|d| d.contains("token")));
    }

    #[test]
    fn partial_outcome_keeps_posts_and_reports_error() {
        let outcome = FetchOutcome::partial(
            Vec::new(),
            SourceError::UnexpectedStatus {
                status: 502,
                url: "https://example.test".to_owned(),
            },
        );
        let report = SourceReport::from_outcome(Platform::Reddit, &outcome);
        assert_eq!(report.status, SourceStatus::TransportFailed);
    }

    // --- fan-out ---

    #[tokio::test]
    async fn empty_source_set_reports_both_platforms_skipped() {
        let sources = SourceSet {
            reddit: None,
            x: None,
        };
        assert!(sources.is_empty());

        let collected = collect_posts(&sources, 100).await;
        assert!(collected.posts.is_empty());
        let statuses: Vec<(Platform, SourceStatus)> = collected
            .reports
            .iter()
            .map(|r| (r.platform, r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (Platform::Reddit, SourceStatus::Skipped),
                (Platform::X, SourceStatus::Skipped),
            ]
        );
    }
}
