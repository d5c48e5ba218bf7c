//! Application state shared across handlers

use std::sync::Arc;

use exchange::{Accounts, ExchangeEngine, ExchangePolicy};
use sqlx::PgPool;

use crate::middleware::JwtVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub engine: ExchangeEngine,
    pub accounts: Accounts,
    /// `None` in email-trust mode
    pub jwt: Option<Arc<JwtVerifier>>,
}

impl AppState {
    pub fn new(db_pool: PgPool, policy: ExchangePolicy, jwt: Option<JwtVerifier>) -> Self {
        let engine = ExchangeEngine::new(db_pool.clone(), policy);
        Self {
            db_pool,
            accounts: Accounts::new(engine.clone()),
            engine,
            jwt: jwt.map(Arc::new),
        }
    }
}
