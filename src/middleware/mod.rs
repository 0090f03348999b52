use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Tags the request with a fresh id. Handler logs run inside a span carrying
/// it and the response echoes it back in `X-Trace-Id`.
pub async fn assign_trace_id(req: Request<Body>, next: Next) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        %trace_id,
        method = %req.method(),
        path = req.uri().path(),
    );

    let mut res = async move {
        tracing::debug!("request received");
        next.run(req).await
    }
    .instrument(span)
    .await;

    res.headers_mut().insert(
        TRACE_ID_HEADER,
        HeaderValue::from_str(&trace_id).unwrap_or(HeaderValue::from_static("invalid")),
    );
    res
}
