use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use time::OffsetDateTime;

/// Length of an issued token key, matching the classic 40-char hex keys
/// clients already store.
pub const KEY_LEN: usize = 40;

/// Generate a fresh opaque token key.
pub fn generate_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(char::from)
        .collect()
}

/// Return the user's persisted token key, creating one if absent.
/// A user holds at most one token; repeat logins return the same key.
pub async fn issue(db: &PgPool, user_id: i64) -> anyhow::Result<String> {
    let existing =
        sqlx::query_as::<_, (String,)>("SELECT key FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    if let Some((key,)) = existing {
        return Ok(key);
    }

    let key = generate_key();
    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)")
        .bind(&key)
        .bind(user_id)
        .execute(db)
        .await?;
    tracing::debug!(user_id = %user_id, "token issued");
    Ok(key)
}

/// Resolve a presented key to an active user id, or `None` if the key is
/// unknown, the user is inactive, or the key predates `issued_after`.
pub async fn resolve(
    db: &PgPool,
    key: &str,
    issued_after: Option<OffsetDateTime>,
) -> anyhow::Result<Option<i64>> {
    let row = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT u.id
        FROM auth_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.key = $1
          AND u.is_active
          AND ($2::timestamptz IS NULL OR t.created_at >= $2)
        "#,
    )
    .bind(key)
    .bind(issued_after)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(id,)| id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_40_alphanumeric_chars() {
        let key = generate_key();
        assert_eq!(key.len(), KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(generate_key(), generate_key());
    }
}
