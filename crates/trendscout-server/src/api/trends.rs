use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use trendscout_db::{top_trends, TrendAnalysisRow};
use trendscout_trends::TrendAnalysis;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct TrendsQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TrendsData {
    count: usize,
    trends: Vec<TrendAnalysis>,
}

/// `GET /api/trends` - the highest-scoring trend analyses, viral score
/// descending.
pub(super) async fn list_trends(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<ApiResponse<TrendsData>>, ApiError> {
    let limit = normalize_limit(query.limit);
    let rows = top_trends(&state.pool, limit)
        .await
        .map_err(|err| map_db_error(&err, &request_id))?;

    let trends: Vec<TrendAnalysis> =
        rows.into_iter().map(TrendAnalysisRow::into_analysis).collect();
    Ok(Json(ApiResponse::new(
        TrendsData {
            count: trends.len(),
            trends,
        },
        &request_id,
    )))
}
