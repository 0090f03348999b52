use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{api, middleware::assign_trace_id, repo::dataset::Dataset};

#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<Dataset>,
}

pub fn build_router(dataset: Arc<Dataset>) -> Router {
    let state = AppState { dataset };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(assign_trace_id));

    Router::new()
        .route("/", get(api::dataset::overview))
        .route("/healthz", get(api::health::health_check))
        .route("/dataset/features", get(api::dataset::features))
        .route("/recommendations", get(api::recommendations::recommend_books))
        .layer(middleware)
        .with_state(state)
}
