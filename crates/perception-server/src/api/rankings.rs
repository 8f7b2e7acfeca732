use axum::{
    extract::{Query, State},
    Extension, Json,
};
use perception_metrics::{CitationRank, CompetitorRank};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_engine_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct RankingsQuery {
    pub limit: Option<usize>,
}

pub(super) async fn list_competitors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RankingsQuery>,
) -> Result<Json<ApiResponse<Vec<CompetitorRank>>>, ApiError> {
    let mut ranks = state
        .manager
        .competitor_ranking()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    ranks.truncate(normalize_limit(query.limit));

    Ok(Json(ApiResponse::new(req_id.0, ranks)))
}

pub(super) async fn list_citations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RankingsQuery>,
) -> Result<Json<ApiResponse<Vec<CitationRank>>>, ApiError> {
    let mut ranks = state
        .manager
        .citation_ranking()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    ranks.truncate(normalize_limit(query.limit));

    Ok(Json(ApiResponse::new(req_id.0, ranks)))
}
