//! Error taxonomy for the exchange core

use thiserror::Error;
use uuid::Uuid;

use crate::models::RequestStatus;

/// Message surfaced verbatim to end users when a send is blocked.
pub const INSUFFICIENT_TOKENS_MESSAGE: &str = "insufficient tokens";

/// Errors raised by the ledger, the state machines and the engine.
///
/// Every variant except `Database` is raised before any side effect is
/// committed, so callers may safely retry or surface them.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Sender and recipient are the same user
    #[error("cannot send a request to yourself")]
    SelfRequest,

    /// Malformed input (non-positive minutes, empty course code, bad email)
    #[error("{0}")]
    Validation(String),

    /// The sender cannot cover the cost of a request
    #[error("{}", INSUFFICIENT_TOKENS_MESSAGE)]
    InsufficientTokens,

    /// A ledger debit would take the balance below zero
    #[error("insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: i64, required: i64 },

    /// The actor is not a legal party to the entity
    #[error("{0}")]
    NotAuthorized(String),

    /// The request already left the PENDING state
    #[error("request {id} is already {status}")]
    AlreadyResolved { id: Uuid, status: RequestStatus },

    /// The session was already completed
    #[error("session {id} is already completed")]
    AlreadyCompleted { id: Uuid },

    /// Unknown id or email
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ExchangeError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the error is a rejected input rather than a state conflict
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::SelfRequest | Self::Validation(_))
    }

    /// Idempotency guards: repeating the call cannot succeed and changed nothing
    pub fn is_idempotency_guard(&self) -> bool {
        matches!(
            self,
            Self::AlreadyResolved { .. } | Self::AlreadyCompleted { .. }
        )
    }
}

/// Type alias for Result with ExchangeError
pub type ExchangeResult<T> = Result<T, ExchangeError>;
