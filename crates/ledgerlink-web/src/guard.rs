//! Bearer-token guard for protected routes.
//!
//! [`require_session`] runs before every protected handler. A request is
//! only admitted when it carries `Authorization: Bearer <token>` and the
//! token verifies; the verified [`Claims`] are then inserted as a request
//! extension. Every rejection produces the same 401 body and one audit
//! entry naming the specific reason.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ledgerlink_session::Claims;

use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::CorrelationId;

/// Why the `Authorization` header could not yield a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRejection {
    Missing,
    Malformed,
}

impl HeaderRejection {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Missing => "missing_token",
            Self::Malformed => "malformed_header",
        }
    }
}

/// Extract the token from a `Bearer` authorization value. The scheme is
/// matched case-insensitively.
pub fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty() && !token.contains(char::is_whitespace)).then_some(token)
}

/// Pull the bearer token out of request headers.
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, HeaderRejection> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(HeaderRejection::Missing)?
        .to_str()
        .map_err(|_| HeaderRejection::Malformed)?;
    extract_bearer_token(value).ok_or(HeaderRejection::Malformed)
}

pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let correlation = req
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_else(CorrelationId::generate);

    let verified: Result<Claims, &'static str> = match bearer_from_headers(req.headers()) {
        Err(rejection) => Err(rejection.reason_code()),
        Ok(token) => state
            .orchestrator
            .issuer()
            .verify(token)
            .map_err(|e| e.reason_code()),
    };

    match verified {
        Ok(claims) => {
            state
                .audit
                .auth_success(&claims.owner_id, correlation.as_str());
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(reason) => {
            state.audit.auth_failure(reason, correlation.as_str());
            ApiError::unauthorized()
                .with_correlation(&correlation)
                .into_response()
        }
    }
}
