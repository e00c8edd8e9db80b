use bigdecimal::BigDecimal;
use std::fmt;

pub const CUSTOMER_NAME_MAX_LEN: usize = 120;
pub const PHONE_MAX_LEN: usize = 32;
pub const USERNAME_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Amounts, rates and payments may be zero but never negative.
pub fn validate_non_negative(field: &'static str, value: &BigDecimal) -> ValidationResult {
    if value < &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(())
}

pub fn validate_customer_name(name: &str) -> Result<String, ValidationError> {
    let name = sanitize_string(name);
    validate_required("customer_name", &name)?;
    validate_max_len("customer_name", &name, CUSTOMER_NAME_MAX_LEN)?;
    Ok(name)
}

pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    let phone = sanitize_string(phone);
    validate_max_len("phone", &phone, PHONE_MAX_LEN)?;
    Ok(phone)
}

pub fn validate_username(username: &str) -> ValidationResult {
    validate_required("username", username)?;
    validate_max_len("username", username, USERNAME_MAX_LEN)?;

    if username != username.trim() || username.chars().any(|ch| ch.is_control() || ch == ',') {
        return Err(ValidationError::new(
            "username",
            "must not contain commas, control characters or surrounding whitespace",
        ));
    }

    Ok(())
}
