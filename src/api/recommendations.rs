use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    app::AppState,
    error::AppResult,
    model::{RecommendationQuery, RecommendationsResp},
    service,
};

pub async fn recommend_books(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationsResp>> {
    let resp = service::recommend::recommend_for_title(&state.dataset, query)?;
    Ok(Json(resp))
}
