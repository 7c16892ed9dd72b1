use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use trendscout_db::{recent_posts, recent_trend_count};
use trendscout_trends::{build_dashboard, DashboardSnapshot};

use super::{map_db_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

/// One week. Longer windows would scan the whole posts table.
const MAX_LOOKBACK_HOURS: i64 = 168;

#[derive(Debug, Deserialize)]
pub(super) struct DashboardQuery {
    hours: Option<i64>,
}

/// `GET /api/dashboard` - aggregated stats over the recent-post window.
pub(super) async fn dashboard(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<DashboardSnapshot>>, ApiError> {
    let hours = query
        .hours
        .unwrap_or(state.config.dashboard_lookback_hours)
        .clamp(1, MAX_LOOKBACK_HOURS);
    let now = Utc::now();
    let since = now - Duration::hours(hours);

    let posts = recent_posts(&state.pool, since)
        .await
        .map_err(|err| map_db_error(&err, &request_id))?;
    let trend_count = recent_trend_count(&state.pool, since)
        .await
        .map_err(|err| map_db_error(&err, &request_id))?;

    let snapshot = build_dashboard(
        &posts,
        usize::try_from(trend_count).unwrap_or(0),
        hours,
        now,
    );
    Ok(Json(ApiResponse::new(snapshot, &request_id)))
}
