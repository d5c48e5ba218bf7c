//! Token ledger entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Cause of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_reason", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerReason {
    RequestSent,
    RequestRefunded,
    SessionTaught,
    AdminAdjust,
}

/// Immutable record of a single balance change, in tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delta: i64,
    pub reason: LedgerReason,
    pub request_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What caused a ledger entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerRef {
    pub request_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub note: Option<String>,
}

impl LedgerRef {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn request(request_id: Uuid) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::default()
        }
    }

    pub fn session(request_id: Uuid, session_id: Uuid) -> Self {
        Self {
            request_id: Some(request_id),
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

/// Cached balance next to the entry sum it must equal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub user_id: Uuid,
    pub cached_balance: i64,
    pub entry_sum: i64,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.cached_balance == self.entry_sum
    }
}
