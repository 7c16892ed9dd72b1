use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use trendscout_core::Platform;

use super::{map_db_error, ApiError, ApiResponse, AppState};
use crate::discovery::{
    run_discovery, DiscoveryError, DiscoveryOptions, DiscoveryOutcome, DiscoverySummary,
};
use crate::middleware::RequestId;

/// Body of `POST /api/discovery/run`. The body itself is optional;
/// defaults mean "every configured source at the configured cap".
#[derive(Debug, Default, Deserialize)]
pub(super) struct DiscoveryRequest {
    sources: Option<Vec<String>>,
    max_posts_per_source: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CompletedData {
    status: &'static str,
    #[serde(flatten)]
    summary: DiscoverySummary,
}

#[derive(Debug, Serialize)]
struct DeferredData {
    status: &'static str,
    code: &'static str,
    retry_after_secs: u64,
    retry_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<DateTime<Utc>>,
}

/// `POST /api/discovery/run` - runs one discovery pass now.
///
/// 200 with counters when the pass ran, 429 with a retry time when the
/// interval gate or a provider quota refused it.
pub(super) async fn trigger_discovery(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let request: DiscoveryRequest = if body.is_empty() {
        DiscoveryRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                return ApiError::new(
                    "validation_error",
                    format!("invalid request body: {err}"),
                    &request_id,
                )
                .into_response();
            }
        }
    };

    if matches!(&request.sources, Some(sources) if sources.is_empty()) {
        return ApiError::new("validation_error", "sources must not be empty", &request_id)
            .into_response();
    }
    let sources = match parse_sources(request.sources.as_deref()) {
        Ok(sources) => sources,
        Err(unknown) => {
            return ApiError::new(
                "validation_error",
                format!("unknown source: {unknown}"),
                &request_id,
            )
            .into_response();
        }
    };

    let now = Utc::now();
    let options = DiscoveryOptions {
        trigger: "api",
        sources,
        max_posts_per_source: request.max_posts_per_source,
        now,
    };

    match run_discovery(&state.pool, &state.config, &state.budget, options).await {
        Ok(DiscoveryOutcome::Completed(summary)) => Json(ApiResponse::new(
            CompletedData {
                status: "completed",
                summary,
            },
            &request_id,
        ))
        .into_response(),
        Ok(DiscoveryOutcome::Deferred {
            code,
            retry_after_secs,
            reset_at,
        }) => deferred_response(code, retry_after_secs, reset_at, now, &request_id),
        Err(err) => error_response(err, &request_id),
    }
}

fn parse_sources(raw: Option<&[String]>) -> Result<Option<Vec<Platform>>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let mut platforms = Vec::new();
    for name in raw {
        let platform = name.parse::<Platform>().map_err(|_| name.clone())?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(Some(platforms))
}

fn deferred_response(
    code: &'static str,
    retry_after_secs: u64,
    reset_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    request_id: &RequestId,
) -> Response {
    let retry_at = reset_at.unwrap_or_else(|| {
        now + Duration::seconds(i64::try_from(retry_after_secs).unwrap_or(i64::MAX))
    });
    let data = DeferredData {
        status: "deferred",
        code,
        retry_after_secs,
        retry_at,
        reset_at,
    };

    let mut response =
        (StatusCode::TOO_MANY_REQUESTS, Json(ApiResponse::new(data, request_id))).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

fn error_response(err: DiscoveryError, request_id: &RequestId) -> Response {
    match err {
        DiscoveryError::UpstreamAuth { detail } => {
            ApiError::new("auth_failure", detail, request_id).into_response()
        }
        DiscoveryError::Upstream { detail } => {
            ApiError::new("upstream_error", detail, request_id).into_response()
        }
        DiscoveryError::Db(db_err) => map_db_error(&db_err, request_id).into_response(),
        DiscoveryError::Source(source_err) => {
            tracing::error!(error = %source_err, "source client construction failed");
            ApiError::new(
                "internal_error",
                "could not construct source clients",
                request_id,
            )
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_names_parse_with_the_twitter_alias() {
        let raw = vec!["reddit".to_owned(), "twitter".to_owned()];
        let parsed = parse_sources(Some(&raw)).expect("both names are known");
        assert_eq!(parsed, Some(vec![Platform::Reddit, Platform::X]));
    }

    #[test]
    fn duplicate_source_names_collapse() {
        let raw = vec!["x".to_owned(), "x".to_owned()];
        let parsed = parse_sources(Some(&raw)).expect("known name");
        assert_eq!(parsed, Some(vec![Platform::X]));
    }

    #[test]
    fn unknown_source_name_is_reported_back() {
        let raw = vec!["reddit".to_owned(), "myspace".to_owned()];
        let unknown = parse_sources(Some(&raw)).expect_err("unknown name fails");
        assert_eq!(unknown, "myspace");
    }

    #[test]
    fn absent_sources_mean_no_filter() {
        assert_eq!(parse_sources(None).expect("absent is fine"), None);
    }

    #[test]
    fn deferred_body_names_the_retry_time() {
        let now = Utc::now();
        let data = DeferredData {
            status: "deferred",
            code: "quota_exhausted",
            retry_after_secs: 3600,
            retry_at: now + Duration::hours(1),
            reset_at: Some(now + Duration::hours(1)),
        };
        let value = serde_json::to_value(&data).expect("serializes");
        assert_eq!(value["status"], "deferred");
        assert_eq!(value["code"], "quota_exhausted");
        assert_eq!(value["retry_after_secs"], 3600);
        assert!(value.get("reset_at").is_some());
    }
}
