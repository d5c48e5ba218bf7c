//! Exchange domain models

pub mod ledger;
pub mod request;
pub mod session;
pub mod user;

use uuid::Uuid;

// Re-export for convenience
pub use ledger::{LedgerAudit, LedgerEntry, LedgerReason, LedgerRef};
pub use request::{NewRequest, Request, RequestStatus, Resolution, ValidRequest};
pub use session::{NewSession, Session, SessionStatus};
pub use user::{User, UserProfile, normalize_email};

/// Who is driving a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated user
    User(Uuid),
    /// Scheduled maintenance such as the expiry sweep
    System,
}
