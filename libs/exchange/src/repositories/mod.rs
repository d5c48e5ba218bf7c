//! Repositories for database operations
//!
//! Single-statement functions accept any executor, so they run equally on the
//! pool for reads or inside an engine transaction.

pub mod request;
pub mod session;
pub mod user;

pub use request::RequestRepository;
pub use session::SessionRepository;
pub use user::UserRepository;
