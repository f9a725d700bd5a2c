//! Input checks applied before any request reaches the account store.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{accounts::Gender, error::ApiError};

const PASSWORD_SPECIALS: &str = "@$!%*?&";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::bad_request(e.0)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if !is_valid_email(email) {
        return Err(ValidationError("Please enter a valid email address"));
    }
    Ok(email.to_string())
}

pub fn new_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 8 {
        return Err(ValidationError("Password must be at least 8 characters"));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !(has_lower && has_upper && has_digit && has_special) {
        return Err(ValidationError(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }
    Ok(())
}

pub fn name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError("Name is required"));
    }
    if name.chars().count() > 100 {
        return Err(ValidationError("Name must be less than 100 characters"));
    }
    Ok(name.to_string())
}

pub fn age(value: i32) -> Result<i32, ValidationError> {
    if value < 1 {
        return Err(ValidationError("Age must be at least 1"));
    }
    if value > 120 {
        return Err(ValidationError("Age must be less than 120"));
    }
    Ok(value)
}

pub fn age_str(raw: &str) -> Result<i32, ValidationError> {
    let value = raw
        .trim()
        .parse::<i32>()
        .map_err(|_| ValidationError("Age must be a number"))?;
    age(value)
}

pub fn gender(raw: &str) -> Result<Gender, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError("Please select a valid gender"))
}
