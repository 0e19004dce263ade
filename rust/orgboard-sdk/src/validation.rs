//! Client-side checks run before a form is submitted.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LEN: usize = 8;

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("valid phone regex"))
}

pub fn validate_required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

pub fn validate_password_pair(password: &str, confirm: &str) -> Result<(), ValidationError> {
    validate_required("password", password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    if password != confirm {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Accepts formatting characters (spaces, dashes, dots, parentheses) and
/// returns the normalized number.
pub fn validate_phone(phone: &str) -> Result<String, ValidationError> {
    let normalized: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if phone_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::InvalidPhone(phone.to_string()))
    }
}
