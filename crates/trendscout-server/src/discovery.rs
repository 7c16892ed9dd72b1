//! Discovery orchestration: one end-to-end pass from source fetch to
//! persisted posts and trend analyses, recorded as a `discovery_runs` row.
//!
//! Every caller (API handler, cron job, CLI) goes through [`run_discovery`];
//! the run row is the audit trail for all of them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use trendscout_core::{AppConfig, Platform, PostIdentity};
use trendscout_db::{
    complete_discovery_run, create_discovery_run, fail_discovery_run, insert_trend_analyses,
    known_post_ids, latest_successful_run, start_discovery_run, upsert_posts, DbError, RunCounts,
};
use trendscout_sources::{
    collect_posts, SharedBudget, SourceReport, SourceSet, SourceStatus,
};
use trendscout_trends::{analyze_posts, discovery_gate, InsightClient, KeywordClassifier};
use uuid::Uuid;

/// How a discovery pass was requested.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Recorded on the run row: `api`, `scheduler`, or `cli`.
    pub trigger: &'static str,
    /// Restrict the pass to these platforms. `None` means every configured
    /// source.
    pub sources: Option<Vec<Platform>>,
    /// Per-source fetch cap override; defaults to the configured cap.
    pub max_posts_per_source: Option<usize>,
    pub now: DateTime<Utc>,
}

impl DiscoveryOptions {
    #[must_use]
    pub fn new(trigger: &'static str, now: DateTime<Utc>) -> Self {
        Self {
            trigger,
            sources: None,
            max_posts_per_source: None,
            now,
        }
    }
}

/// Counters for a completed pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiscoverySummary {
    pub run_id: Uuid,
    pub total_posts: usize,
    pub new_posts: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub analyses: usize,
    pub suggestions: usize,
    pub sources: Vec<SourceReport>,
}

/// Result of asking for a discovery pass.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    Completed(DiscoverySummary),
    /// The pass did not run and should be retried later. `code` is the
    /// machine-readable reason (`discovery_deferred`, `quota_exhausted`,
    /// `rate_limited`).
    Deferred {
        code: &'static str,
        retry_after_secs: u64,
        reset_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("all sources failed authentication: {detail}")]
    UpstreamAuth { detail: String },

    #[error("all sources failed: {detail}")]
    Upstream { detail: String },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("source construction failed: {0}")]
    Source(#[from] trendscout_sources::SourceError),
}

/// Runs one discovery pass end to end.
///
/// The pass is refused (deferred, no run row) while the minimum interval
/// since the last successful run has not elapsed. Once admitted it is
/// recorded as a run row that ends `succeeded` or `failed`; a pass blocked
/// wholesale by provider quotas fails its row and reports `Deferred` so
/// callers can surface the retry time.
///
/// # Errors
///
/// Returns [`DiscoveryError::UpstreamAuth`] or [`DiscoveryError::Upstream`]
/// when every active source failed and nothing was fetched, and
/// [`DiscoveryError::Db`] for persistence failures.
pub async fn run_discovery(
    pool: &PgPool,
    config: &AppConfig,
    budget: &SharedBudget,
    options: DiscoveryOptions,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    let last_success = latest_successful_run(pool).await?;
    if let Some(wait) =
        discovery_gate(last_success, options.now, config.min_discovery_interval_mins)
    {
        let retry_after_secs = u64::try_from(wait.num_seconds()).unwrap_or(0).max(1);
        tracing::debug!(
            trigger = options.trigger,
            retry_after_secs,
            "discovery deferred; minimum interval not elapsed"
        );
        return Ok(DiscoveryOutcome::Deferred {
            code: "discovery_deferred",
            retry_after_secs,
            reset_at: None,
        });
    }

    let run = create_discovery_run(pool, options.trigger).await?;
    start_discovery_run(pool, run.id).await?;
    tracing::info!(run_id = %run.public_id, trigger = options.trigger, "discovery run started");

    match execute_pass(pool, config, budget, &options).await {
        Ok(PassResult::Completed {
            mut summary,
            counts,
            reports_json,
        }) => {
            complete_discovery_run(pool, run.id, counts, &reports_json).await?;
            summary.run_id = run.public_id;
            tracing::info!(
                run_id = %run.public_id,
                total_posts = summary.total_posts,
                new_posts = summary.new_posts,
                analyses = summary.analyses,
                "discovery run succeeded"
            );
            Ok(DiscoveryOutcome::Completed(summary))
        }
        Ok(PassResult::Blocked {
            code,
            retry_after_secs,
            reset_at,
            message,
        }) => {
            mark_failed(pool, run.id, &message).await;
            tracing::warn!(run_id = %run.public_id, code, %message, "discovery run blocked");
            Ok(DiscoveryOutcome::Deferred {
                code,
                retry_after_secs,
                reset_at,
            })
        }
        Err(err) => {
            mark_failed(pool, run.id, &err.to_string()).await;
            tracing::error!(run_id = %run.public_id, error = %err, "discovery run failed");
            Err(err)
        }
    }
}

#[derive(Debug)]
enum PassResult {
    Completed {
        summary: DiscoverySummary,
        counts: RunCounts,
        reports_json: serde_json::Value,
    },
    Blocked {
        code: &'static str,
        retry_after_secs: u64,
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },
}

async fn execute_pass(
    pool: &PgPool,
    config: &AppConfig,
    budget: &SharedBudget,
    options: &DiscoveryOptions,
) -> Result<PassResult, DiscoveryError> {
    let mut sources = SourceSet::from_app_config(config, budget)?;
    if let Some(wanted) = &options.sources {
        if !wanted.contains(&Platform::Reddit) {
            sources.reddit = None;
        }
        if !wanted.contains(&Platform::X) {
            sources.x = None;
        }
    }

    let max_posts = options
        .max_posts_per_source
        .unwrap_or(config.max_posts_per_source);
    let collected = collect_posts(&sources, max_posts).await;

    if collected.posts.is_empty() {
        if let Some(blocked) = classify_empty_pass(&collected.reports, options.now) {
            return blocked;
        }
    }

    let fetched: usize = collected.reports.iter().map(|r| r.fetched).sum();
    let known = known_identities(pool, &collected.posts).await?;
    let insight = build_insight_client(config);

    let outcome = analyze_posts(
        collected.posts,
        &known,
        &KeywordClassifier,
        insight.as_ref(),
        options.now,
    )
    .await;

    let persisted = upsert_posts(pool, &outcome.posts).await?;
    let trends_created = insert_trend_analyses(pool, &outcome.analyses).await?;

    let reports_json = serde_json::to_value(&collected.reports)
        .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()));
    let counts = RunCounts {
        posts_fetched: to_count(fetched),
        new_posts: to_count(outcome.new_posts),
        trends_created: to_count(trends_created),
    };

    Ok(PassResult::Completed {
        summary: DiscoverySummary {
            // Overwritten with the run's public id by the caller.
            run_id: Uuid::nil(),
            total_posts: persisted,
            new_posts: outcome.new_posts,
            rejected: outcome.rejected,
            duplicates: outcome.duplicates,
            analyses: outcome.analyses.len(),
            suggestions: outcome.suggestion_count,
            sources: collected.reports,
        },
        counts,
        reports_json,
    })
}

/// Decides whether a pass that fetched nothing was a real failure.
///
/// A source that reported `Ok` with zero posts makes the pass a legitimate
/// empty run. Otherwise: all quotas exhausted defers until the earliest
/// reset, any auth failure is an upstream auth error, all rate-limited
/// defers by the longest wait, and anything else is an upstream error.
fn classify_empty_pass(
    reports: &[SourceReport],
    now: DateTime<Utc>,
) -> Option<Result<PassResult, DiscoveryError>> {
    let active: Vec<&SourceReport> = reports
        .iter()
        .filter(|r| r.status != SourceStatus::Skipped)
        .collect();
    if active.is_empty() || active.iter().any(|r| r.status == SourceStatus::Ok) {
        return None;
    }

    let detail = failure_detail(&active);

    if active
        .iter()
        .all(|r| r.status == SourceStatus::QuotaExhausted)
    {
        let reset_at = active.iter().filter_map(|r| r.reset_at).min();
        let retry_after_secs = reset_at
            .map(|at| u64::try_from((at - now).num_seconds()).unwrap_or(0))
            .unwrap_or(0)
            .max(1);
        return Some(Ok(PassResult::Blocked {
            code: "quota_exhausted",
            retry_after_secs,
            reset_at,
            message: format!("all sources quota-exhausted: {detail}"),
        }));
    }

    if active.iter().any(|r| r.status == SourceStatus::AuthFailed) {
        return Some(Err(DiscoveryError::UpstreamAuth { detail }));
    }

    if active.iter().all(|r| r.status == SourceStatus::RateLimited) {
        let retry_after_secs = active
            .iter()
            .filter_map(|r| r.retry_after_secs)
            .max()
            .unwrap_or(0)
            .max(1);
        return Some(Ok(PassResult::Blocked {
            code: "rate_limited",
            retry_after_secs,
            reset_at: None,
            message: format!("all sources rate-limited: {detail}"),
        }));
    }

    Some(Err(DiscoveryError::Upstream { detail }))
}

fn failure_detail(reports: &[&SourceReport]) -> String {
    reports
        .iter()
        .map(|r| {
            let detail = r.detail.as_deref().unwrap_or("no detail");
            format!("{}: {detail}", r.platform.as_str())
        })
        .collect::<Vec<_>>()
        .join("; ")
}

async fn known_identities(
    pool: &PgPool,
    posts: &[trendscout_core::Post],
) -> Result<HashSet<PostIdentity>, DbError> {
    let mut known = HashSet::new();
    for platform in Platform::all() {
        let ids: Vec<String> = posts
            .iter()
            .filter(|p| p.platform == *platform)
            .map(|p| p.source_post_id.clone())
            .collect();
        for source_post_id in known_post_ids(pool, *platform, &ids).await? {
            known.insert(PostIdentity {
                platform: *platform,
                source_post_id,
            });
        }
    }
    Ok(known)
}

fn build_insight_client(config: &AppConfig) -> Option<InsightClient> {
    let url = config.insight_service_url.as_deref()?;
    match InsightClient::new(url, config.insight_timeout_secs) {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "insight client unavailable; using local summaries");
            None
        }
    }
}

/// Failing the run row must not mask the original error.
async fn mark_failed(pool: &PgPool, run_id: i64, message: &str) {
    if let Err(err) = fail_discovery_run(pool, run_id, message).await {
        tracing::error!(run_id, error = %err, "could not mark discovery run failed");
    }
}

fn to_count(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
