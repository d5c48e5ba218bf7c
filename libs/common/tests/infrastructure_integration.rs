//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL schema is migrated and that the
//! constraints the exchange relies on are in place.

use common::database::{health_check, run_migrations};
use sqlx::{PgPool, Row};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[sqlx::test(migrations = false)]
async fn test_migrations_apply_and_are_idempotent(pool: PgPool) -> TestResult {
    run_migrations(&pool).await?;
    run_migrations(&pool).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    for table in ["users", "requests", "sessions", "ledger_entries"] {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(table)
            .fetch_one(&pool)
            .await?;
        let present: bool = row.get("present");
        assert!(present, "{table} should exist after migrating");
    }

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_token_balance_cannot_go_negative(pool: PgPool) -> TestResult {
    let row = sqlx::query("INSERT INTO users (email) VALUES ('a@example.com') RETURNING id")
        .fetch_one(&pool)
        .await?;
    let id: uuid::Uuid = row.get("id");

    let result = sqlx::query("UPDATE users SET token_balance = -1 WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await;
    assert!(result.is_err(), "negative balances must be rejected");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_email_must_be_stored_lowercase(pool: PgPool) {
    let result = sqlx::query("INSERT INTO users (email) VALUES ('Mixed@Example.com')")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
