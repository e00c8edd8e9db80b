use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::domain::{LoanDraft, Session};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: BigDecimal,
}

pub async fn list_loans(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let loans = state
        .loans
        .list_loans(&session, params.search.as_deref())
        .await?;
    Ok(Json(loans))
}

pub async fn get_loan(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.get_loan(&session, &id).await?))
}

pub async fn add_loan(
    State(state): State<AppState>,
    session: Session,
    Json(draft): Json<LoanDraft>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.loans.add_loan(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn edit_loan(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(draft): Json<LoanDraft>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.edit_loan(&session, &id, draft).await?))
}

pub async fn record_payment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Json(payment): Json<PaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .loans
            .record_payment(&session, &id, &payment.amount)
            .await?,
    ))
}

pub async fn customer_history(
    State(state): State<AppState>,
    session: Session,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.history(&session, &name).await?))
}

pub async fn active_customers(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.loans.active_customers(&session).await?))
}
