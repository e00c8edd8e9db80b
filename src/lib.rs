pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod drive;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db::{LoanStore, UserStore};
use crate::services::{AccessGate, LoanService};

#[derive(Clone)]
pub struct AppState {
    pub loans: Arc<LoanService>,
    pub access: Arc<AccessGate>,
}

impl AppState {
    pub fn new(loans: LoanService, access: AccessGate) -> Self {
        Self {
            loans: Arc::new(loans),
            access: Arc::new(access),
        }
    }

    /// Wires the stores, the sync collaborator and the access gate from
    /// configuration.
    pub fn from_config(config: &Config) -> Self {
        let loans = LoanService::new(
            LoanStore::new(config.loans_path()),
            drive::collaborator_from_config(config),
            config.edit_cleared_policy,
        );
        let access = AccessGate::new(UserStore::new(config.users_path()), config.bcrypt_cost);
        Self::new(loans, access)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/me", get(handlers::auth::me))
        .route(
            "/loans",
            get(handlers::loans::list_loans).post(handlers::loans::add_loan),
        )
        .route(
            "/loans/:id",
            get(handlers::loans::get_loan).put(handlers::loans::edit_loan),
        )
        .route("/loans/:id/payments", post(handlers::loans::record_payment))
        .route("/customers", get(handlers::loans::active_customers))
        .route(
            "/customers/:name/history",
            get(handlers::loans::customer_history),
        )
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route("/reports/profit", get(handlers::dashboard::profit_report))
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
