//! Request correlation.
//!
//! Every request gets a correlation id, taken from the `x-correlation-id`
//! header when the caller supplies a sane one and generated otherwise. The
//! id is stored as a request extension, recorded on the request span, and
//! echoed on the response so client reports can be matched to server logs.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, info_span};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Longest caller-supplied correlation id we accept.
const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_acceptable(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_CORRELATION_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Attach the correlation id header to `response`.
pub fn attach_correlation(response: &mut Response, id: &CorrelationId) {
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
}

pub async fn correlation_layer(mut req: Request<Body>, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| is_acceptable(value))
        .map(|value| CorrelationId(value.to_owned()))
        .unwrap_or_else(CorrelationId::generate);

    req.extensions_mut().insert(id.clone());

    let span = info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri().path(),
        correlation_id = %id.as_str()
    );

    let mut response = next.run(req).instrument(span).await;
    attach_correlation(&mut response, &id);
    response
}
