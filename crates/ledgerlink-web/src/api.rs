//! REST API route handlers.
//!
//! Provides the health probe, link-token creation, the credential exchange
//! and the guarded transactions resource.

use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use chrono::{Months, Utc};
use ledgerlink_session::{Claims, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiErrorKind};
use crate::guard::bearer_from_headers;
use crate::state::AppState;
use crate::telemetry::CorrelationId;

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// POST /api/create_link_token
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct LinkTokenResponse {
    pub link_token: String,
}

pub async fn create_link_token(
    State(state): State<Arc<AppState>>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
) -> Result<Json<LinkTokenResponse>, ApiError> {
    let owner_id = state.resolve_owner(bearer_from_headers(&headers).ok());

    match state.orchestrator.create_link_token(&owner_id).await {
        Ok(link_token) => Ok(Json(LinkTokenResponse { link_token })),
        Err(e) => {
            state
                .audit
                .upstream_failed("create_link_token", &e.to_string(), correlation.as_str());
            Err(ApiError::new(ApiErrorKind::LinkTokenFailed).with_correlation(&correlation))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /session/exchange, POST /api/exchange_public_token
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub public_token: Option<String>,
}

/// Both keys carry the same token; `jwt` is what the dashboard client reads.
#[derive(Serialize)]
pub struct ExchangeResponse {
    pub token: String,
    pub jwt: String,
}

/// Parse the exchange body. An empty body is a request without a public
/// token, which only the simulated provider accepts.
fn parse_exchange_body(body: &[u8]) -> Option<ExchangeRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(ExchangeRequest::default());
    }
    serde_json::from_slice(body).ok()
}

fn exchange_failure_reason(error: &SessionError) -> &'static str {
    match error {
        SessionError::Upstream { .. } | SessionError::Network(_) => "upstream",
        SessionError::Vault(_) => "encryption",
        SessionError::Signing { .. } => "signing",
        _ => "internal",
    }
}

pub async fn exchange(
    State(state): State<Arc<AppState>>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExchangeResponse>, ApiError> {
    let Some(request) = parse_exchange_body(&body) else {
        return Err(ApiError::new(ApiErrorKind::BadRequest).with_correlation(&correlation));
    };
    let owner_id = state.resolve_owner(bearer_from_headers(&headers).ok());

    match state
        .orchestrator
        .exchange(&owner_id, request.public_token.as_deref())
        .await
    {
        Ok(token) => {
            state.audit.exchange_succeeded(
                &owner_id,
                state.orchestrator.provider_name(),
                correlation.as_str(),
            );
            let token = token.into_string();
            Ok(Json(ExchangeResponse {
                jwt: token.clone(),
                token,
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, owner_id = %owner_id, "exchange failed");
            state
                .audit
                .exchange_failed(exchange_failure_reason(&e), correlation.as_str());
            Err(ApiError::new(ApiErrorKind::ExchangeFailed).with_correlation(&correlation))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /session/protected-resource, GET /api/transactions
// ---------------------------------------------------------------------------

/// Return the last year of transactions for the authenticated owner.
///
/// Only reachable through [`crate::guard::require_session`], which inserts
/// the verified [`Claims`].
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Extension(correlation): Extension<CorrelationId>,
) -> Response {
    let end = Utc::now().date_naive();
    let start = end.checked_sub_months(Months::new(12)).unwrap_or(end);

    match state
        .orchestrator
        .fetch_transactions(&claims, start, end)
        .await
    {
        Ok(transactions) => Json(Value::Array(transactions)).into_response(),
        Err(e) => resource_error(&state, &claims, &correlation, e).into_response(),
    }
}

fn resource_error(
    state: &AppState,
    claims: &Claims,
    correlation: &CorrelationId,
    error: SessionError,
) -> ApiError {
    let kind = match &error {
        SessionError::NoSession { .. } => {
            state.audit.auth_failure("no_session", correlation.as_str());
            ApiErrorKind::Unauthorized
        }
        SessionError::Vault(_) => {
            state
                .audit
                .decryption_failed(&claims.owner_id, correlation.as_str());
            ApiErrorKind::ResourceFailed
        }
        e if e.is_upstream() => {
            state
                .audit
                .upstream_failed("fetch_transactions", &e.to_string(), correlation.as_str());
            ApiErrorKind::UpstreamUnavailable
        }
        e => {
            tracing::error!(error = %e, "transactions fetch failed");
            ApiErrorKind::ResourceFailed
        }
    };
    ApiError::new(kind).with_correlation(correlation)
}
