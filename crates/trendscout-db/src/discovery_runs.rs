//! Database operations for the `discovery_runs` table.
//!
//! Lifecycle: `queued` -> `running` -> `succeeded` | `failed`. Transitions
//! are guarded in SQL so a crashed or raced orchestrator cannot corrupt the
//! state a later pacing decision reads.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `discovery_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscoveryRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub posts_fetched: i32,
    pub new_posts: i32,
    pub trends_created: i32,
    pub error_message: Option<String>,
    /// Per-source fetch reports serialized at completion time.
    pub source_reports: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Counters recorded when a run completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounts {
    pub posts_fetched: i32,
    pub new_posts: i32,
    pub trends_created: i32,
}

/// Creates a new discovery run in `queued` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_discovery_run(
    pool: &PgPool,
    trigger_source: &str,
) -> Result<DiscoveryRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, DiscoveryRunRow>(
        "INSERT INTO discovery_runs (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING id, public_id, trigger_source, status, started_at, completed_at, \
                   posts_fetched, new_posts, trends_created, error_message, \
                   source_reports, created_at",
    )
    .bind(public_id)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and stamps `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_discovery_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE discovery_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` with its counters and per-source reports.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_discovery_run(
    pool: &PgPool,
    id: i64,
    counts: RunCounts,
    source_reports: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE discovery_runs \
         SET status = 'succeeded', completed_at = NOW(), posts_fetched = $1, \
             new_posts = $2, trends_created = $3, source_reports = $4 \
         WHERE id = $5 AND status = 'running'",
    )
    .bind(counts.posts_fetched)
    .bind(counts.new_posts)
    .bind(counts.trends_created)
    .bind(Json(source_reports))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_discovery_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE discovery_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Completion time of the most recent succeeded run, if any.
///
/// This is the durable input to the discovery pacing gate.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_successful_run(pool: &PgPool) -> Result<Option<DateTime<Utc>>, DbError> {
    let completed_at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT completed_at FROM discovery_runs \
         WHERE status = 'succeeded' AND completed_at IS NOT NULL \
         ORDER BY completed_at DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(completed_at.flatten())
}
