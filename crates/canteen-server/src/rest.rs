//! HTTP API: push subscription management and the kitchen status bridge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, post, put};
use axum::Router;
use canteen_core::protocol::{KitchenStatus, PushSubscription, events};
use canteen_core::{Identity, Intent};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use crate::server::AppState;

/// Errors returned by the HTTP API as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is well-formed JSON but not acceptable.
    #[error("{0}")]
    BadRequest(String),
    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The server is shutting down.
    #[error("server is shutting down")]
    Unavailable,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/push/subscriptions", post(create_subscription))
        .route("/push/subscriptions/{identity}", delete(delete_subscription))
        .route("/kitchens/{kitchen_id}/status", put(update_kitchen_status))
}

/// `POST /api/v1/push/subscriptions` body.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Phone number, user id or kitchen id.
    pub identity: String,
    /// Browser push subscription.
    pub subscription: PushSubscription,
}

/// `PUT /api/v1/kitchens/{kitchenId}/status` body.
#[derive(Debug, Deserialize)]
pub struct KitchenStatusRequest {
    /// `true`/`false` or a status text.
    pub status: Value,
}

async fn create_subscription(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = body.identity.trim();
    if identity.is_empty() {
        return Err(ApiError::BadRequest("identity must not be empty".into()));
    }
    if body.subscription.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("subscription endpoint must not be empty".into()));
    }

    let identity = Identity::from(identity);
    state
        .notifier
        .subscribe(identity.clone(), body.subscription)
        .await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "identity": identity })),
    ))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<StatusCode, ApiError> {
    let identity = Identity::from_string(identity);
    if state.notifier.store().remove(&identity).await {
        info!(identity = %identity, "push subscription deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "no push subscription for {identity}"
        )))
    }
}

async fn update_kitchen_status(
    State(state): State<AppState>,
    Path(kitchen_id): Path<String>,
    Json(body): Json<KitchenStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match &body.status {
        Value::Bool(online) => KitchenStatus::Online(*online),
        Value::String(text) if !text.trim().is_empty() => KitchenStatus::Text(text.clone()),
        _ => {
            return Err(ApiError::BadRequest(
                "status must be a boolean or a non-empty string".into(),
            ));
        }
    };

    let intent = Intent::KitchenStatusChanged {
        event: events::KITCHEN_STATUS_UPDATED.into(),
        status,
        payload: json!({ "kitchenId": kitchen_id, "status": body.status }),
    };
    let report = state
        .publisher
        .dispatch(intent)
        .await
        .map_err(|_| ApiError::Unavailable)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "recipients": report.recipients })),
    ))
}
