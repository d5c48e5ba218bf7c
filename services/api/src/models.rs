//! Request and response payloads for the HTTP boundary

use chrono::{DateTime, Utc};
use exchange::{
    ExchangePolicy,
    models::{LedgerEntry, LedgerReason, UserProfile},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create or refresh a user on sign-in
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub university: Option<String>,
    pub timezone: Option<String>,
    pub image: Option<String>,
}

impl From<UpsertUserRequest> for UserProfile {
    fn from(req: UpsertUserRequest) -> Self {
        UserProfile {
            email: req.email,
            name: req.name,
            university: req.university,
            timezone: req.timezone,
            image: req.image,
        }
    }
}

/// Send a tutoring request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeRequest {
    /// Sender; informational when a bearer token identifies the caller
    pub from_email: Option<String>,
    pub to_email: String,
    pub course_code: String,
    pub minutes: Option<i32>,
    pub note: Option<String>,
}

/// Body of accept, decline, cancel and done
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingRequest {
    pub acting_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub acting_email: Option<String>,
    pub start_at: DateTime<Utc>,
}

/// Administrative balance correction
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub email: String,
    pub delta: i64,
    pub note: Option<String>,
}

/// `?email=` selector for read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mailbox {
    #[default]
    Inbox,
    Outbox,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    pub email: Option<String>,
    #[serde(rename = "box", default)]
    pub mailbox: Mailbox,
}

/// Ledger entry expressed in minutes of teaching
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLine {
    pub id: Uuid,
    pub delta: i64,
    pub reason: LedgerReason,
    pub request_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `GET /ledger`: balance and entries in minutes
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub balance: i64,
    pub entries: Vec<LedgerLine>,
}

impl LedgerResponse {
    pub fn in_minutes(tokens: i64, entries: Vec<LedgerEntry>, policy: &ExchangePolicy) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| LedgerLine {
                id: e.id,
                delta: policy.minutes_for_tokens(e.delta),
                reason: e.reason,
                request_id: e.request_id,
                session_id: e.session_id,
                note: e.note,
                created_at: e.created_at,
            })
            .collect();

        Self {
            balance: policy.minutes_for_tokens(tokens),
            entries,
        }
    }
}

/// `GET /tokens`: the same ledger in tokens
#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub tokens: i64,
    pub entries: Vec<LedgerEntry>,
}
