use axum::{extract::State, Json};

use crate::{
    app::AppState,
    model::{DatasetFeatures, DatasetOverview},
    service,
};

pub async fn overview(State(state): State<AppState>) -> Json<DatasetOverview> {
    Json(service::stats::overview(&state.dataset))
}

pub async fn features(State(state): State<AppState>) -> Json<DatasetFeatures> {
    Json(service::stats::describe_dataset(&state.dataset))
}
