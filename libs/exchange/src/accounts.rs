//! User accounts: first sign-in upsert and administrative ledger corrections

use tracing::info;
use uuid::Uuid;

use crate::{
    engine::ExchangeEngine,
    error::{ExchangeError, ExchangeResult},
    ledger::Ledger,
    models::{LedgerEntry, LedgerReason, LedgerRef, User, UserProfile, normalize_email},
    repositories::UserRepository,
};

/// Account operations that sit beside the exchange
#[derive(Clone)]
pub struct Accounts {
    engine: ExchangeEngine,
}

impl Accounts {
    pub fn new(engine: ExchangeEngine) -> Self {
        Self { engine }
    }

    /// Create the user on first sign-in or refresh their profile.
    ///
    /// A newly created user receives the signup grant in the same
    /// transaction that creates the row.
    pub async fn upsert(&self, profile: UserProfile) -> ExchangeResult<User> {
        let profile = UserProfile {
            email: normalize_email(&profile.email)?,
            ..profile
        };

        let mut tx = self.engine.pool().begin().await?;

        let (mut user, created) = UserRepository::upsert(&mut *tx, &profile).await?;

        let grant = self.engine.policy().signup_grant_tokens;
        if created && grant > 0 {
            Ledger::credit(
                &mut *tx,
                user.id,
                grant,
                LedgerReason::AdminAdjust,
                LedgerRef::none().with_note(Some("signup grant".to_string())),
            )
            .await?;
            user.token_balance += grant;
        }

        tx.commit().await?;

        if created {
            info!(user_id = %user.id, grant, "user created");
        }
        Ok(user)
    }

    /// Look up a user by email, case-insensitively
    pub async fn require_by_email(&self, email: &str) -> ExchangeResult<User> {
        let email = normalize_email(email)?;
        UserRepository::find_by_email(self.engine.pool(), &email)
            .await?
            .ok_or_else(|| ExchangeError::not_found("user", email))
    }

    pub async fn require_by_id(&self, id: Uuid) -> ExchangeResult<User> {
        UserRepository::find_by_id(self.engine.pool(), id)
            .await?
            .ok_or_else(|| ExchangeError::not_found("user", id))
    }

    /// Signed administrative correction to a balance
    pub async fn adjust(
        &self,
        user_id: Uuid,
        delta: i64,
        note: Option<String>,
    ) -> ExchangeResult<LedgerEntry> {
        let mut tx = self.engine.pool().begin().await?;
        let reference = LedgerRef::none().with_note(note);
        let entry = Ledger::adjust(&mut *tx, user_id, delta, reference).await?;
        tx.commit().await?;

        info!(%user_id, delta, "ledger adjusted");
        Ok(entry)
    }
}
