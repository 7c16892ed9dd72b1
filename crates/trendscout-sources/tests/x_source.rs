//! Integration tests for `XSource::fetch_posts`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test. Covers the
//! one-request discipline, score-sorted truncation, the two distinct 429
//! meanings (rolling window vs monthly usage cap), and auth failures.

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trendscout_core::Platform;
use trendscout_sources::{
    shared, Acquire, RateBudgetConfig, RateBudgetTracker, SharedBudget, SourceError, XConfig,
    XSource,
};

/// Budget with no X rules: tests that are not about budgeting run unthrottled.
fn open_budget() -> SharedBudget {
    shared(RateBudgetTracker::new(
        RateBudgetConfig::default(),
        Utc::now(),
    ))
}

fn standard_budget() -> SharedBudget {
    shared(RateBudgetTracker::new(
        RateBudgetConfig::standard(),
        Utc::now(),
    ))
}

fn test_source(server: &MockServer, budget: SharedBudget) -> XSource {
    XSource::new(
        XConfig {
            bearer_token: "test-bearer".to_owned(),
            search_query: "(viral OR trending) lang:en -is:retweet".to_owned(),
            request_timeout_secs: 5,
            max_retries: 0,
            backoff_base_ms: 1,
        },
        budget,
    )
    .expect("failed to build test XSource")
    .with_api_base(server.uri())
}

/// Search response with `count` tweets where tweet `t{i}` has `i * 10` likes,
/// so higher indexes score higher.
fn search_body(count: usize) -> serde_json::Value {
    let created_at = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let data: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("t{i}"),
                "text": format!("trending thing number {i} #wave"),
                "author_id": "u0",
                "created_at": created_at,
                "public_metrics": {
                    "retweet_count": 0,
                    "reply_count": 0,
                    "like_count": i * 10,
                    "quote_count": 0,
                    "bookmark_count": 0,
                    "impression_count": 0
                },
                "entities": {"hashtags": [{"tag": "wave"}], "mentions": []}
            })
        })
        .collect();
    json!({
        "data": data,
        "includes": {
            "users": [{
                "id": "u0",
                "username": "surfer",
                "name": "Surfer",
                "public_metrics": {"followers_count": 1000}
            }]
        }
    })
}

// ---------------------------------------------------------------------------
// Test 1 - results come back score-sorted and truncated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_results_are_sorted_by_score_and_capped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(query_param("max_results", "100"))
        .and(query_param(
            "query",
            "(viral OR trending) lang:en -is:retweet",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&search_body(30)))
        .expect(1)
        .mount(&server)
        .await;

    let source = test_source(&server, open_budget());
    let outcome = source.fetch_posts(100).await;

    assert!(
        outcome.error.is_none(),
        "expected clean completion, got: {:?}",
        outcome.error
    );
    assert_eq!(outcome.posts.len(), 25, "kept slice should cap at 25");
    assert_eq!(
        outcome.posts[0].source_post_id, "t29",
        "highest-liked tweet should rank first"
    );
    assert_eq!(
        outcome.posts[24].source_post_id, "t5",
        "slice should hold the top 25 by score"
    );
    assert!(
        outcome
            .posts
            .windows(2)
            .all(|w| w[0].engagement_score >= w[1].engagement_score),
        "scores should be non-increasing"
    );
}

#[tokio::test]
async fn caller_ceiling_below_25_wins() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&search_body(30)))
        .mount(&server)
        .await;

    let source = test_source(&server, open_budget());
    let outcome = source.fetch_posts(10).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.posts.len(), 10);
}

// ---------------------------------------------------------------------------
// Test 2 - usage-cap 429 exhausts the quota for the whole period
// ---------------------------------------------------------------------------

#[tokio::test]
async fn usage_cap_429_reports_quota_exhausted_and_blocks_the_tracker() {
    let server = MockServer::start().await;

    let reset_epoch = (Utc::now() + Duration::hours(6)).timestamp();
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", reset_epoch.to_string().as_str())
                .set_body_json(&json!({
                    "title": "UsageCapExceeded",
                    "detail": "Usage cap exceeded: Monthly product cap",
                    "period": "Monthly"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let budget = standard_budget();
    let source = test_source(&server, budget.clone());
    let outcome = source.fetch_posts(100).await;

    assert!(outcome.posts.is_empty());
    let reset_at = match outcome.error {
        Some(SourceError::QuotaExhausted { reset_at, .. }) => {
            assert_eq!(
                reset_at.timestamp(),
                reset_epoch,
                "reset should come from the x-rate-limit-reset header"
            );
            reset_at
        }
        other => panic!("expected SourceError::QuotaExhausted, got: {other:?}"),
    };

    // The tracker must refuse further X requests until the reset.
    let decision = budget.lock().await.try_acquire(Platform::X, Utc::now());
    assert_eq!(decision, Acquire::QuotaExhausted { reset_at });
}

// ---------------------------------------------------------------------------
// Test 3 - plain 429 is an ordinary rolling-window limit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn plain_429_reports_rate_limited_without_blocking_the_period() {
    let server = MockServer::start().await;

    let reset_epoch = (Utc::now() + Duration::minutes(10)).timestamp();
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-rate-limit-reset", reset_epoch.to_string().as_str())
                .set_body_json(&json!({"title": "Too Many Requests"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let budget = open_budget();
    let source = test_source(&server, budget.clone());
    let outcome = source.fetch_posts(100).await;

    match outcome.error {
        Some(SourceError::RateLimited {
            retry_after_secs, ..
        }) => {
            assert!(
                (595..=600).contains(&retry_after_secs),
                "wait should be derived from the reset header, got {retry_after_secs}"
            );
        }
        other => panic!("expected SourceError::RateLimited, got: {other:?}"),
    }

    // No period block: the tracker still answers Allowed for an open config.
    let decision = budget.lock().await.try_acquire(Platform::X, Utc::now());
    assert_eq!(decision, Acquire::Allowed);
}

// ---------------------------------------------------------------------------
// Test 4 - saturated window skips the request entirely
// ---------------------------------------------------------------------------

#[tokio::test]
async fn saturated_window_defers_without_calling_the_provider() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&search_body(5)))
        .expect(0)
        .mount(&server)
        .await;

    let budget = standard_budget();
    budget.lock().await.record_request(Platform::X, Utc::now());

    let source = test_source(&server, budget);
    let outcome = source.fetch_posts(100).await;

    assert!(outcome.posts.is_empty());
    match outcome.error {
        Some(SourceError::RateLimited {
            retry_after_secs, ..
        }) => {
            assert!(
                retry_after_secs <= 15 * 60,
                "wait should be at most the window length, got {retry_after_secs}"
            );
            assert!(retry_after_secs > 14 * 60, "wait should be near 15 minutes");
        }
        other => panic!("expected SourceError::RateLimited, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 5 - auth and malformed-body handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_search_reports_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let source = test_source(&server, open_budget());
    let outcome = source.fetch_posts(100).await;

    assert!(outcome.posts.is_empty());
    assert!(
        matches!(outcome.error, Some(SourceError::Auth { .. })),
        "expected SourceError::Auth, got: {:?}",
        outcome.error
    );
}

#[tokio::test]
async fn malformed_search_body_degrades_to_empty_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let source = test_source(&server, open_budget());
    let outcome = source.fetch_posts(100).await;

    assert!(outcome.error.is_none(), "malformed body is not fatal");
    assert!(outcome.posts.is_empty());
}
