//! Token ledger
//!
//! Balances are the running sum of immutable ledger entries. The sum is
//! cached on `users.token_balance`, and every write to that cache happens in
//! the same statement sequence, on the same connection, as the entry insert.
//! Callers pass their open transaction so the ledger movement commits or
//! rolls back together with the state transition that caused it.

use sqlx::{PgConnection, PgExecutor};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{ExchangeError, ExchangeResult},
    models::{LedgerAudit, LedgerEntry, LedgerReason, LedgerRef},
};

const COLUMNS: &str = "id, user_id, delta, reason, request_id, session_id, note, created_at";

/// Token ledger operations
pub struct Ledger;

impl Ledger {
    /// Current balance of a user, in tokens
    pub async fn balance_of(executor: impl PgExecutor<'_>, user_id: Uuid) -> ExchangeResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT token_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| ExchangeError::not_found("user", user_id))
    }

    /// Add `amount` tokens to a user's balance
    pub async fn credit(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        reference: LedgerRef,
    ) -> ExchangeResult<LedgerEntry> {
        ensure_positive(amount)?;

        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET token_balance = token_balance + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING token_balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ExchangeError::not_found("user", user_id))?;

        debug!(%user_id, amount, ?reason, balance, "ledger credit");
        Self::append(conn, user_id, amount, reason, reference).await
    }

    /// Remove `amount` tokens from a user's balance.
    ///
    /// The balance check and the decrement are one guarded statement, so two
    /// concurrent debits can never both pass against the same tokens.
    pub async fn debit(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i64,
        reason: LedgerReason,
        reference: LedgerRef,
    ) -> ExchangeResult<LedgerEntry> {
        ensure_positive(amount)?;

        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET token_balance = token_balance - $2, updated_at = NOW()
             WHERE id = $1 AND token_balance >= $2
             RETURNING token_balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(balance) = balance else {
            let available = Self::balance_of(&mut *conn, user_id).await?;
            return Err(ExchangeError::InsufficientBalance {
                available,
                required: amount,
            });
        };

        debug!(%user_id, amount, ?reason, balance, "ledger debit");
        Self::append(conn, user_id, -amount, reason, reference).await
    }

    /// Administrative correction; the sign of `delta` picks credit or debit
    pub async fn adjust(
        conn: &mut PgConnection,
        user_id: Uuid,
        delta: i64,
        reference: LedgerRef,
    ) -> ExchangeResult<LedgerEntry> {
        match delta {
            0 => Err(ExchangeError::Validation(
                "adjustment must be non-zero".to_string(),
            )),
            d if d > 0 => {
                Self::credit(conn, user_id, d, LedgerReason::AdminAdjust, reference).await
            }
            d => {
                let amount = d.checked_neg().ok_or_else(|| {
                    ExchangeError::Validation(format!("adjustment {d} is out of range"))
                })?;
                Self::debit(conn, user_id, amount, LedgerReason::AdminAdjust, reference).await
            }
        }
    }

    async fn append(
        conn: &mut PgConnection,
        user_id: Uuid,
        delta: i64,
        reason: LedgerReason,
        reference: LedgerRef,
    ) -> ExchangeResult<LedgerEntry> {
        let query = format!(
            "INSERT INTO ledger_entries (user_id, delta, reason, request_id, session_id, note)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let entry = sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(user_id)
            .bind(delta)
            .bind(reason)
            .bind(reference.request_id)
            .bind(reference.session_id)
            .bind(reference.note)
            .fetch_one(conn)
            .await?;
        Ok(entry)
    }

    /// All entries of a user in the order they were written
    pub async fn entries(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> ExchangeResult<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {COLUMNS} FROM ledger_entries
             WHERE user_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await?;
        Ok(entries)
    }

    /// Tokens debited when the request was sent
    pub async fn debited_for_request(
        executor: impl PgExecutor<'_>,
        request_id: Uuid,
    ) -> ExchangeResult<i64> {
        let debited = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(-SUM(delta), 0)::BIGINT FROM ledger_entries
             WHERE request_id = $1 AND reason = $2",
        )
        .bind(request_id)
        .bind(LedgerReason::RequestSent)
        .fetch_one(executor)
        .await?;
        Ok(debited)
    }

    /// Compare the cached balance with the sum of entries
    pub async fn audit(
        executor: impl PgExecutor<'_>,
        user_id: Uuid,
    ) -> ExchangeResult<LedgerAudit> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT u.token_balance, COALESCE(SUM(e.delta), 0)::BIGINT
             FROM users u
             LEFT JOIN ledger_entries e ON e.user_id = u.id
             WHERE u.id = $1
             GROUP BY u.token_balance",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ExchangeError::not_found("user", user_id))?;

        Ok(LedgerAudit {
            user_id,
            cached_balance: row.0,
            entry_sum: row.1,
        })
    }
}

fn ensure_positive(amount: i64) -> ExchangeResult<()> {
    if amount <= 0 {
        return Err(ExchangeError::Validation(format!(
            "ledger amounts must be positive, got {amount}"
        )));
    }
    Ok(())
}
