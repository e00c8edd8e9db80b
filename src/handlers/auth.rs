use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::domain::Session;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Self-service sign-up; new accounts are always customers.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .access
        .register(&request.username, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(Session::from(&account))))
}

pub async fn me(session: Session) -> Json<Session> {
    Json(session)
}
