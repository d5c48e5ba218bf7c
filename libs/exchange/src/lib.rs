//! Swap exchange core
//!
//! The transactional heart of the Swap tutoring marketplace: users spend a
//! token to send a tutoring request, the recipient accepts or declines it, an
//! accepted request becomes a session, and completing a session credits its
//! teacher with tokens for the minutes taught.
//!
//! - [`Ledger`]: token balances as the sum of immutable entries
//! - [`ExchangeEngine`]: send, accept, decline, cancel, schedule, complete
//! - [`Sweeper`]: expiry of requests left pending too long
//! - [`Accounts`]: user upsert and administrative adjustments
//! - [`notifications`]: pure badge counts over fetched snapshots

pub mod accounts;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod notifications;
pub mod policy;
pub mod repositories;
pub mod sweeper;

pub use accounts::Accounts;
pub use engine::{Acceptance, ExchangeEngine};
pub use error::{ExchangeError, ExchangeResult, INSUFFICIENT_TOKENS_MESSAGE};
pub use ledger::Ledger;
pub use notifications::NotificationCounts;
pub use policy::{ExchangePolicy, REQUEST_COST_TOKENS};
pub use sweeper::Sweeper;
