//! Request repository for database operations

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{Request, RequestStatus, ValidRequest};

const COLUMNS: &str =
    "id, from_user_id, to_user_id, course_code, minutes, note, status, created_at, resolved_at";

/// Request repository
pub struct RequestRepository;

impl RequestRepository {
    /// Insert a new PENDING request
    pub async fn insert(
        executor: impl PgExecutor<'_>,
        request: &ValidRequest,
    ) -> Result<Request, sqlx::Error> {
        let query = format!(
            "INSERT INTO requests (from_user_id, to_user_id, course_code, minutes, note)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(request.from_user_id)
            .bind(request.to_user_id)
            .bind(&request.course_code)
            .bind(request.minutes)
            .bind(&request.note)
            .fetch_one(executor)
            .await
    }

    pub async fn find(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM requests WHERE id = $1");
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Read a request and hold its row lock until the transaction ends
    pub async fn lock(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Move a PENDING request to `status`.
    ///
    /// Returns `None` if the request is no longer PENDING.
    pub async fn resolve(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "UPDATE requests SET status = $2, resolved_at = NOW()
             WHERE id = $1 AND status = $3
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(id)
            .bind(status)
            .bind(RequestStatus::Pending)
            .fetch_optional(executor)
            .await
    }

    /// Lock the oldest PENDING request created before `cutoff`.
    ///
    /// Rows locked by other transactions are skipped so concurrent sweepers
    /// never block on one another.
    pub async fn claim_stale(
        executor: impl PgExecutor<'_>,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<Request>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM requests
             WHERE status = $1 AND created_at < $2
             ORDER BY created_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(RequestStatus::Pending)
            .bind(cutoff)
            .fetch_optional(executor)
            .await
    }

    /// Requests received by a user, newest first
    pub async fn list_inbox(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Vec<Request>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM requests WHERE to_user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Requests sent by a user, newest first
    pub async fn list_outbox(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> Result<Vec<Request>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM requests WHERE from_user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Request>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }
}
