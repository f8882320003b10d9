//! Client-side input checks, run before anything is sent to the backend.

use std::path::Path;
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use thiserror::Error;

use crate::constants::{ALLOWED_UPLOAD_EXTENSIONS, MAX_FILE_SIZE, MIN_YEAR};
use crate::models::RegisterRequest;

#[allow(clippy::expect_used)] // constant pattern
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex should not panic")
});

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// # Errors
/// Fails when `email` is not of the form `local@domain.tld`.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email", "Enter a valid email address"))
    }
}

/// At least 8 characters with an uppercase letter, a lowercase letter and
/// a digit.
///
/// # Errors
/// Reports the first rule the password breaks.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let rule = if password.chars().count() < 8 {
        Some("Password must be at least 8 characters")
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        Some("Password must contain at least one uppercase letter")
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        Some("Password must contain at least one lowercase letter")
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("Password must contain at least one number")
    } else {
        None
    };
    match rule {
        Some(message) => Err(ValidationError::new("password", message)),
        None => Ok(()),
    }
}

/// Uploads are limited to 10 MiB of PDF or JPEG/PNG.
///
/// # Errors
/// Fails on oversized files and unsupported extensions.
pub fn validate_upload_file(file_name: &str, size: u64) -> Result<(), ValidationError> {
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::new(
            "file",
            format!(
                "File size must be less than {}MB",
                MAX_FILE_SIZE / (1024 * 1024)
            ),
        ));
    }
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::new(
            "file",
            format!(
                "File type not allowed. Allowed: {}",
                ALLOWED_UPLOAD_EXTENSIONS.join(", ")
            ),
        ));
    }
    Ok(())
}

/// Exam year between 2000 and next year, inclusive.
///
/// # Errors
/// Fails outside that range.
pub fn validate_year(year: i32) -> Result<(), ValidationError> {
    validate_year_against(year, chrono::Utc::now().year())
}

fn validate_year_against(year: i32, current_year: i32) -> Result<(), ValidationError> {
    let max = current_year + 1;
    if (MIN_YEAR..=max).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "year",
            format!("Year must be between {MIN_YEAR} and {max}"),
        ))
    }
}

/// # Errors
/// Fails on an empty index number, a malformed email, a weak password or
/// mismatching passwords.
pub fn validate_registration(data: &RegisterRequest) -> Result<(), ValidationError> {
    if data.index_number.trim().is_empty() {
        return Err(ValidationError::new("index_number", "Index number is required"));
    }
    validate_email(&data.email)?;
    validate_password(&data.password)?;
    if data.password != data.confirm_password {
        return Err(ValidationError::new("confirm_password", "Passwords do not match"));
    }
    Ok(())
}

/// # Errors
/// Fails when `reason` is blank.
pub fn validate_rejection_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        Err(ValidationError::new("rejection_reason", "Rejection reason is required"))
    } else {
        Ok(())
    }
}
