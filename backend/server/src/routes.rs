use std::sync::Arc;

use axum::{
    Json,
    extract::{State as AxumState, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use store::models::NewMessage;
use tracing::info;

use crate::{error::AppError, session::Visitor, state::State};

#[derive(Deserialize)]
pub struct SubscribeRequest {
    email: String,
}

/// Unwraps a JSON body, reporting a bad one as [`AppError::MalformedPayload`].
pub fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::MalformedPayload(e.body_text()))
}

/// Only emptiness is checked; format is left to the backend.
pub fn required(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::MalformedPayload(format!("{field} is required")));
    }

    Ok(())
}

pub async fn subscribe_handler(
    AxumState(state): AxumState<Arc<State>>,
    body: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = payload(body)?;
    required("email", &request.email)?;

    let subscription = state
        .backend
        .public_dashboard()
        .add_subscription(request.email.trim())
        .await?;
    info!("New newsletter subscription {}", subscription.id);

    Ok((StatusCode::CREATED, Json(subscription)).into_response())
}

pub async fn message_handler(
    AxumState(state): AxumState<Arc<State>>,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> Result<Response, AppError> {
    let message = payload(body)?;
    required("name", &message.name)?;
    required("email", &message.email)?;
    required("message", &message.message)?;

    let message = state.backend.public_dashboard().add_message(message).await?;
    info!("New contact message {}", message.id);

    Ok((StatusCode::CREATED, Json(message)).into_response())
}

pub async fn session_handler(visitor: Visitor) -> Response {
    let user = visitor.user();

    visitor.finish(Json(json!({ "user": user })))
}
