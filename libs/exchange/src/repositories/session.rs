//! Session repository for database operations

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{NewSession, Session, SessionStatus};

const COLUMNS: &str = "id, request_id, teacher_id, learner_id, course_code, minutes, status, \
    start_at, end_at, completed_at, created_at";

/// Session repository
pub struct SessionRepository;

impl SessionRepository {
    /// Insert the session bound to an accepted request
    pub async fn insert(
        executor: impl PgExecutor<'_>,
        session: &NewSession,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (request_id, teacher_id, learner_id, course_code, minutes)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(session.request_id)
            .bind(session.teacher_id)
            .bind(session.learner_id)
            .bind(&session.course_code)
            .bind(session.minutes)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_request(
        executor: impl PgExecutor<'_>,
        request_id: Uuid,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE request_id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(request_id)
            .fetch_optional(executor)
            .await
    }

    /// Read a session and hold its row lock until the transaction ends
    pub async fn lock(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Set the time window of a session that is not done yet
    pub async fn schedule(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE sessions SET start_at = $2, end_at = $3
             WHERE id = $1 AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(start_at)
            .bind(end_at)
            .bind(SessionStatus::Scheduled)
            .fetch_optional(executor)
            .await
    }

    /// Mark a scheduled session done. Returns `None` if it already was.
    pub async fn complete(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!(
            "UPDATE sessions SET status = $2, completed_at = NOW()
             WHERE id = $1 AND status = $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .bind(SessionStatus::Done)
            .bind(SessionStatus::Scheduled)
            .fetch_optional(executor)
            .await
    }

    /// Sessions where the user teaches or learns, soonest first, unscheduled last
    pub async fn list_for_user(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE teacher_id = $1 OR learner_id = $1
             ORDER BY start_at ASC NULLS LAST, created_at DESC"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }
}
