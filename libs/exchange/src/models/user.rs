//! User model and related functionality

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{ExchangeError, ExchangeResult};

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub university: Option<String>,
    pub timezone: Option<String>,
    pub image: Option<String>,
    pub token_balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields accepted on first sign-in or later upserts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: Option<String>,
    pub university: Option<String>,
    pub timezone: Option<String>,
    pub image: Option<String>,
}

/// Canonical form of an email: trimmed, lower-cased and syntactically valid.
///
/// Emails identify users case-insensitively.
pub fn normalize_email(email: &str) -> ExchangeResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(ExchangeError::Validation("Email is required".to_string()));
    }

    if email.len() > 254 {
        return Err(ExchangeError::Validation(
            "Email must be at most 254 characters long".to_string(),
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(&email) {
        return Err(ExchangeError::Validation("Invalid email format".to_string()));
    }

    Ok(email)
}
