pub mod auth;
pub mod dashboard;
pub mod loans;

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub ledger: String,
}

/// Liveness plus whether the ledger file has been created yet.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let ledger = match tokio::fs::metadata(state.loans.store_path()).await {
        Ok(_) => "present",
        Err(_) => "empty",
    };

    Json(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: ledger.to_string(),
    })
}
