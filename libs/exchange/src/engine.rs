//! Exchange engine
//!
//! Every public operation runs as one short database transaction: the
//! affected request or session row is locked with `SELECT ... FOR UPDATE`,
//! the transition is checked against the locked state, the status-guarded
//! update and any ledger movement are written, and the transaction commits.
//! Any error drops the transaction, which rolls everything back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ExchangeError, ExchangeResult},
    ledger::Ledger,
    models::{
        Actor, LedgerReason, LedgerRef, NewRequest, NewSession, Request, Resolution, Session,
    },
    policy::{ExchangePolicy, REQUEST_COST_TOKENS},
    repositories::{RequestRepository, SessionRepository, UserRepository},
};

/// Result of accepting a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acceptance {
    pub request: Request,
    pub session: Session,
}

/// Transactional coordinator for requests, sessions and the ledger
#[derive(Clone)]
pub struct ExchangeEngine {
    pool: PgPool,
    policy: Arc<ExchangePolicy>,
}

impl ExchangeEngine {
    /// Create a new exchange engine
    pub fn new(pool: PgPool, policy: ExchangePolicy) -> Self {
        Self {
            pool,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &ExchangePolicy {
        &self.policy
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Send a request, reserving the sender's token.
    ///
    /// Fails with `InsufficientTokens` and writes nothing when the sender
    /// cannot cover the cost.
    pub async fn send_request(&self, new: NewRequest) -> ExchangeResult<Request> {
        let valid = new.validate(&self.policy)?;

        let mut tx = self.pool.begin().await?;

        for user_id in [valid.from_user_id, valid.to_user_id] {
            if UserRepository::find_by_id(&mut *tx, user_id).await?.is_none() {
                return Err(ExchangeError::not_found("user", user_id));
            }
        }

        let request = RequestRepository::insert(&mut *tx, &valid).await?;

        Ledger::debit(
            &mut *tx,
            request.from_user_id,
            REQUEST_COST_TOKENS,
            LedgerReason::RequestSent,
            LedgerRef::request(request.id),
        )
        .await
        .map_err(|e| match e {
            ExchangeError::InsufficientBalance { available, .. } => {
                warn!(
                    from_user_id = %valid.from_user_id,
                    available,
                    "request blocked by insufficient tokens"
                );
                ExchangeError::InsufficientTokens
            }
            other => other,
        })?;

        tx.commit().await?;

        info!(
            request_id = %request.id,
            from_user_id = %request.from_user_id,
            to_user_id = %request.to_user_id,
            minutes = request.minutes,
            "request sent"
        );
        Ok(request)
    }

    /// Accept a pending request and open its session
    pub async fn accept_request(
        &self,
        request_id: Uuid,
        actor: Uuid,
    ) -> ExchangeResult<Acceptance> {
        let mut tx = self.pool.begin().await?;

        let request =
            resolve_locked(&mut *tx, request_id, Resolution::Accept, Actor::User(actor)).await?;
        let session =
            SessionRepository::insert(&mut *tx, &NewSession::from_request(&request)).await?;

        tx.commit().await?;

        info!(
            request_id = %request.id,
            session_id = %session.id,
            teacher_id = %session.teacher_id,
            learner_id = %session.learner_id,
            "request accepted"
        );
        Ok(Acceptance { request, session })
    }

    /// Decline a pending request, refunding the sender
    pub async fn decline_request(&self, request_id: Uuid, actor: Uuid) -> ExchangeResult<Request> {
        self.resolve_with_refund(request_id, Resolution::Decline, Actor::User(actor))
            .await
    }

    /// Withdraw a pending request, refunding the sender
    pub async fn cancel_request(&self, request_id: Uuid, actor: Uuid) -> ExchangeResult<Request> {
        self.resolve_with_refund(request_id, Resolution::Cancel, Actor::User(actor))
            .await
    }

    async fn resolve_with_refund(
        &self,
        request_id: Uuid,
        resolution: Resolution,
        actor: Actor,
    ) -> ExchangeResult<Request> {
        let mut tx = self.pool.begin().await?;

        let request = resolve_locked(&mut *tx, request_id, resolution, actor).await?;
        let refunded = refund_sender(&mut *tx, &request, resolution).await?;

        tx.commit().await?;

        info!(
            request_id = %request.id,
            status = %request.status,
            refunded,
            "request resolved"
        );
        Ok(request)
    }

    /// Set or move the time of a session; `end_at` follows from its length
    pub async fn schedule_session(
        &self,
        session_id: Uuid,
        actor: Uuid,
        start_at: DateTime<Utc>,
    ) -> ExchangeResult<Session> {
        let mut tx = self.pool.begin().await?;

        let session = lock_session(&mut *tx, session_id).await?;
        session
            .check_schedule(actor)
            .inspect_err(|e| reject("schedule", session_id, e))?;

        let (start_at, end_at) = session.window_from(start_at)?;
        let session = SessionRepository::schedule(&mut *tx, session_id, start_at, end_at)
            .await?
            .ok_or(ExchangeError::AlreadyCompleted { id: session_id })?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            %start_at,
            %end_at,
            "session scheduled"
        );
        Ok(session)
    }

    /// Complete a session and credit the teacher, exactly once
    pub async fn complete_session(
        &self,
        session_id: Uuid,
        actor: Uuid,
    ) -> ExchangeResult<Session> {
        let mut tx = self.pool.begin().await?;

        let session = lock_session(&mut *tx, session_id).await?;
        session
            .check_complete(actor)
            .inspect_err(|e| reject("complete", session_id, e))?;

        let session = SessionRepository::complete(&mut *tx, session_id)
            .await?
            .ok_or(ExchangeError::AlreadyCompleted { id: session_id })?;

        let earned = self.policy.tokens_earned(session.minutes);
        if earned > 0 {
            Ledger::credit(
                &mut *tx,
                session.teacher_id,
                earned,
                LedgerReason::SessionTaught,
                LedgerRef::session(session.request_id, session.id),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            session_id = %session.id,
            teacher_id = %session.teacher_id,
            earned,
            "session completed"
        );
        Ok(session)
    }
}

/// Lock a request, check the transition and apply the status change.
///
/// Runs inside the caller's transaction.
pub(crate) async fn resolve_locked(
    conn: &mut PgConnection,
    request_id: Uuid,
    resolution: Resolution,
    actor: Actor,
) -> ExchangeResult<Request> {
    let request = RequestRepository::lock(&mut *conn, request_id)
        .await?
        .ok_or_else(|| ExchangeError::not_found("request", request_id))?;

    request
        .check_resolution(resolution, actor)
        .inspect_err(|e| reject(resolution.verb(), request_id, e))?;

    RequestRepository::resolve(&mut *conn, request_id, resolution.target_status())
        .await?
        .ok_or(ExchangeError::AlreadyResolved {
            id: request_id,
            status: request.status,
        })
}

/// Return exactly what was debited when the request was sent, for the
/// resolutions that hand the token back
pub(crate) async fn refund_sender(
    conn: &mut PgConnection,
    request: &Request,
    resolution: Resolution,
) -> ExchangeResult<i64> {
    if !resolution.refunds_sender() {
        return Ok(0);
    }

    let debited = Ledger::debited_for_request(&mut *conn, request.id).await?;
    if debited > 0 {
        Ledger::credit(
            conn,
            request.from_user_id,
            debited,
            LedgerReason::RequestRefunded,
            LedgerRef::request(request.id),
        )
        .await?;
    }
    Ok(debited)
}

async fn lock_session(conn: &mut PgConnection, session_id: Uuid) -> ExchangeResult<Session> {
    SessionRepository::lock(conn, session_id)
        .await?
        .ok_or_else(|| ExchangeError::not_found("session", session_id))
}

fn reject(action: &str, id: Uuid, error: &ExchangeError) {
    warn!(%id, action, %error, "transition rejected");
}
