//! Session model and its state machine

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    error::{ExchangeError, ExchangeResult},
    models::Request,
};

/// Lifecycle of a session: `scheduled` until completed, then `done` forever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Done,
}

/// Session entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub request_id: Uuid,
    pub teacher_id: Uuid,
    pub learner_id: Uuid,
    pub course_code: String,
    pub minutes: i32,
    pub status: SessionStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// New session creation payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub request_id: Uuid,
    pub teacher_id: Uuid,
    pub learner_id: Uuid,
    pub course_code: String,
    pub minutes: i32,
}

impl NewSession {
    /// The recipient of a request is the one asked to teach
    pub fn from_request(request: &Request) -> Self {
        Self {
            request_id: request.id,
            teacher_id: request.to_user_id,
            learner_id: request.from_user_id,
            course_code: request.course_code.clone(),
            minutes: request.minutes,
        }
    }
}

impl Session {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.teacher_id == user_id || self.learner_id == user_id
    }

    pub fn is_done(&self) -> bool {
        self.status == SessionStatus::Done
    }

    fn check_party(&self, user_id: Uuid, action: &str) -> ExchangeResult<()> {
        if !self.is_party(user_id) {
            return Err(ExchangeError::NotAuthorized(format!(
                "only the teacher or learner can {} session {}",
                action, self.id
            )));
        }
        if self.is_done() {
            return Err(ExchangeError::AlreadyCompleted { id: self.id });
        }
        Ok(())
    }

    /// Either party may (re)schedule an undone session
    pub fn check_schedule(&self, actor: Uuid) -> ExchangeResult<()> {
        self.check_party(actor, "schedule")
    }

    /// Either party may complete a scheduled session, once
    pub fn check_complete(&self, actor: Uuid) -> ExchangeResult<()> {
        self.check_party(actor, "complete")
    }

    /// Time window for a session starting at `start_at`
    pub fn window_from(
        &self,
        start_at: DateTime<Utc>,
    ) -> ExchangeResult<(DateTime<Utc>, DateTime<Utc>)> {
        let end_at = start_at
            .checked_add_signed(Duration::minutes(i64::from(self.minutes)))
            .ok_or_else(|| {
                ExchangeError::Validation(format!("start time {start_at} is out of range"))
            })?;
        Ok((start_at, end_at))
    }
}
