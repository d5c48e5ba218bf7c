//! User repository for database operations

use sqlx::{FromRow, PgExecutor, Row};
use uuid::Uuid;

use crate::models::{User, UserProfile};

const COLUMNS: &str =
    "id, email, name, university, timezone, image, token_balance, created_at, updated_at";

/// User repository
pub struct UserRepository;

impl UserRepository {
    /// Insert a user or refresh the profile of an existing one.
    ///
    /// `profile.email` must already be normalised. Returns the user and
    /// whether the row was newly created.
    pub async fn upsert(
        executor: impl PgExecutor<'_>,
        profile: &UserProfile,
    ) -> Result<(User, bool), sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, name, university, timezone, image)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                university = COALESCE(EXCLUDED.university, users.university),
                timezone = COALESCE(EXCLUDED.timezone, users.timezone),
                image = COALESCE(EXCLUDED.image, users.image),
                updated_at = NOW()
             RETURNING {COLUMNS}, (xmax = 0) AS inserted"
        );
        let row = sqlx::query(&query)
            .bind(&profile.email)
            .bind(&profile.name)
            .bind(&profile.university)
            .bind(&profile.timezone)
            .bind(&profile.image)
            .fetch_one(executor)
            .await?;

        let user = User::from_row(&row)?;
        let inserted: bool = row.try_get("inserted")?;
        Ok((user, inserted))
    }

    /// Find a user by ID
    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a user by normalised email
    pub async fn find_by_email(
        executor: impl PgExecutor<'_>,
        email: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(executor)
            .await
    }
}
