use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::domain::Session;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Decodes an `Authorization: Basic ...` header value.
pub fn parse_basic(header: &str) -> Option<BasicCredentials> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Every ledger route takes a `Session`; the request is rejected with 401
/// unless the Basic credentials match an account.
#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(AppError::InvalidCredentials)?;

        let account = state
            .access
            .authenticate(&credentials.username, &credentials.password)
            .await?;

        Ok(Session::from(&account))
    }
}
