// HTTP routes for the shared card record

use super::service::ServiceError;
use super::SharedService;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;

pub const CARDS_PATH: &str = "/api/cards";

#[derive(Clone)]
struct ApiState {
    service: Option<SharedService>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the router; `None` serves every request as a missing store binding
pub fn router(service: Option<SharedService>) -> Router {
    Router::new()
        .route(CARDS_PATH, get(get_cards).put(put_cards))
        .with_state(ApiState { service })
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let (status, payload) = match serde_json::to_string(body) {
        Ok(payload) => (status, payload),
        Err(e) => {
            tracing::error!("Failed to encode response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Failed to encode response"}"#.to_string(),
            )
        }
    };
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        payload,
    )
        .into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ServiceError::MissingBinding | ServiceError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let error = match &self {
            ServiceError::InvalidBody(_) => "Invalid JSON body".to_string(),
            other => other.to_string(),
        };
        json_response(status, &ErrorResponse { error })
    }
}

fn bound(state: &ApiState) -> Result<&SharedService, ServiceError> {
    state.service.as_ref().ok_or(ServiceError::MissingBinding)
}

async fn get_cards(State(state): State<ApiState>) -> Result<Response, ServiceError> {
    tracing::debug!("GET {}", CARDS_PATH);
    let fetched = bound(&state)?.fetch_current()?;
    tracing::debug!("Serving card record ({:?})", fetched.source);
    Ok(json_response(StatusCode::OK, &fetched.envelope))
}

async fn put_cards(State(state): State<ApiState>, body: Bytes) -> Result<Response, ServiceError> {
    tracing::debug!("PUT {} ({} bytes)", CARDS_PATH, body.len());
    let service = bound(&state)?;
    let envelope = service.replace_current(&body).map_err(|e| {
        tracing::warn!("Rejected card record update: {}", e);
        e
    })?;
    Ok(json_response(StatusCode::OK, &envelope))
}
