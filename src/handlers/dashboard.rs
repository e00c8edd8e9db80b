use axum::{extract::State, response::IntoResponse, Json};

use crate::domain::Session;
use crate::error::AppError;
use crate::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.dashboard(&session).await?))
}

pub async fn profit_report(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.profit_report(&session).await?))
}
