//! Client-facing error responses.
//!
//! Internal errors are translated here into a handful of fixed bodies.
//! Nothing from the underlying error (message, source chain, secret) is
//! ever written into the response; the correlation id header is the only
//! link back to the server-side log entry.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::telemetry::{CorrelationId, attach_correlation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiErrorKind {
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid request")]
    BadRequest,
    #[error("exchange failed")]
    ExchangeFailed,
    #[error("link token failed")]
    LinkTokenFailed,
    #[error("transactions fetch failed")]
    ResourceFailed,
    #[error("upstream unavailable")]
    UpstreamUnavailable,
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct ApiError {
    kind: ApiErrorKind,
    correlation_id: Option<CorrelationId>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind) -> Self {
        Self {
            kind,
            correlation_id: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(ApiErrorKind::Unauthorized)
    }

    pub fn with_correlation(mut self, id: &CorrelationId) -> Self {
        self.correlation_id = Some(id.clone());
        self
    }

    pub fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ApiErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorKind::ExchangeFailed
            | ApiErrorKind::LinkTokenFailed
            | ApiErrorKind::ResourceFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ApiErrorKind> for ApiError {
    fn from(kind: ApiErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.kind.to_string(),
        });
        let mut response = (self.status(), body).into_response();
        if let Some(id) = &self.correlation_id {
            attach_correlation(&mut response, id);
        }
        response
    }
}
