use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User record in the database. Identity key is the email, not the
/// username.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: OffsetDateTime,
}

const COLUMNS: &str = "id, email, password_hash, username, first_name, last_name, \
                       is_active, is_staff, is_superuser, date_joined";

impl User {
    /// Find a user by (already normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a new user with an already-hashed password.
    pub async fn insert(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, username, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(username)
            .bind(first_name)
            .bind(last_name)
            .fetch_one(db)
            .await
    }

    /// Grant staff and superuser flags.
    pub async fn elevate(db: &PgPool, id: i64) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET is_staff = TRUE, is_superuser = TRUE \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql).bind(id).fetch_one(db).await
    }

    /// Partial profile update; `None` fields keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        email: Option<&str>,
        password_hash: Option<&str>,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                password_hash = COALESCE($3, password_hash), \
                username = COALESCE($4, username), \
                first_name = COALESCE($5, first_name), \
                last_name = COALESCE($6, last_name) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(email)
            .bind(password_hash)
            .bind(username)
            .bind(first_name)
            .bind(last_name)
            .fetch_one(db)
            .await
    }
}
