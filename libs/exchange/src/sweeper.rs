//! Expiry of stale requests
//!
//! Requests left PENDING longer than the policy's expiry horizon are moved to
//! EXPIRED and their sender refunded. Each request is retired in its own short
//! transaction; rows already locked by a concurrent accept or decline are
//! skipped and reconsidered on the next sweep.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    engine::{ExchangeEngine, refund_sender},
    error::{ExchangeError, ExchangeResult},
    models::{Actor, Request, Resolution},
    repositories::RequestRepository,
};

/// Retires stale pending requests
#[derive(Clone)]
pub struct Sweeper {
    engine: ExchangeEngine,
    batch_limit: usize,
}

impl Sweeper {
    pub fn new(engine: ExchangeEngine) -> Self {
        Self {
            engine,
            batch_limit: 500,
        }
    }

    /// Upper bound on requests expired by a single sweep
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// Expire every request that was still pending at `now - expiry`.
    ///
    /// Returns the requests that were expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> ExchangeResult<Vec<Request>> {
        let expiry = self.engine.policy().request_expiry;
        let cutoff = now.checked_sub_signed(expiry).ok_or_else(|| {
            ExchangeError::Validation(format!("expiry horizon {expiry} is out of range"))
        })?;
        let mut expired = Vec::new();

        while expired.len() < self.batch_limit {
            match self.expire_one(cutoff).await? {
                Some(request) => expired.push(request),
                None => break,
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), %cutoff, "expired stale requests");
        }
        Ok(expired)
    }

    async fn expire_one(&self, cutoff: DateTime<Utc>) -> ExchangeResult<Option<Request>> {
        let mut tx = self.engine.pool().begin().await?;

        let Some(stale) = RequestRepository::claim_stale(&mut *tx, cutoff).await? else {
            return Ok(None);
        };

        stale.check_resolution(Resolution::Expire, Actor::System)?;
        let request = RequestRepository::resolve(
            &mut *tx,
            stale.id,
            Resolution::Expire.target_status(),
        )
        .await?
        .ok_or(ExchangeError::AlreadyResolved {
            id: stale.id,
            status: stale.status,
        })?;
        let refunded = refund_sender(&mut *tx, &request, Resolution::Expire).await?;

        tx.commit().await?;

        info!(request_id = %request.id, refunded, "request expired");
        Ok(Some(request))
    }
}
