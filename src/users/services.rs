use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use sqlx::PgPool;
use tracing::error;

use crate::auth::token;
use crate::error::ApiError;
use crate::users::repo::User;

pub(crate) const MIN_PASSWORD_LEN: usize = 5;

/// Generic credential failure message; must not reveal whether the email
/// exists or the password was wrong.
const BAD_CREDENTIALS: &str = "unable to authenticate with provided credentials";

pub struct NewUser {
    pub email: String,
    pub password: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lower-case the domain part of an email, leaving the local part alone.
pub(crate) fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Create a user: validate, normalize the email, hash the password,
/// persist. Duplicate emails surface as a validation error.
pub async fn create_user(db: &PgPool, new: NewUser) -> Result<User, ApiError> {
    let email = normalize_email(&new.email);
    if email.is_empty() {
        return Err(ApiError::validation("users must have an email"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("invalid email"));
    }
    if new.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = hash_password(&new.password)?;
    let user = User::insert(
        db,
        &email,
        &hash,
        &new.username,
        &new.first_name,
        &new.last_name,
    )
    .await?;
    Ok(user)
}

/// Create a user, then grant staff and superuser flags.
pub async fn create_superuser(db: &PgPool, email: &str, password: &str) -> Result<User, ApiError> {
    let user = create_user(
        db,
        NewUser {
            email: email.to_string(),
            password: password.to_string(),
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        },
    )
    .await?;
    let user = User::elevate(db, user.id).await?;
    Ok(user)
}

/// Exact credential match or one generic failure, never a hint of which
/// half was wrong.
pub async fn authenticate(db: &PgPool, email: &str, password: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);
    let user = User::find_by_email(db, &email)
        .await?
        .ok_or_else(|| ApiError::validation(BAD_CREDENTIALS))?;

    if !user.is_active || !verify_password(password, &user.password_hash)? {
        return Err(ApiError::validation(BAD_CREDENTIALS));
    }
    Ok(user)
}

/// Return the user's opaque bearer credential, minting one if needed.
pub async fn issue_token(db: &PgPool, user: &User) -> Result<String, ApiError> {
    token::issue(db, user.id).await.map_err(ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn normalize_lowercases_domain_only() {
        assert_eq!(normalize_email("test@GMAIL.COM"), "test@gmail.com");
        assert_eq!(normalize_email("Test@GMAIL.com"), "Test@gmail.com");
        assert_eq!(normalize_email("  plain@example.org "), "plain@example.org");
    }

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("test"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    // Validation happens before any query, so the lazy pool never connects.

    #[tokio::test]
    async fn create_user_rejects_empty_email() {
        let state = AppState::fake();
        let err = create_user(
            &state.db,
            NewUser {
                email: "   ".into(),
                password: "Password123".into(),
                username: String::new(),
                first_name: String::new(),
                last_name: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn create_user_rejects_short_password() {
        let state = AppState::fake();
        let err = create_user(
            &state.db,
            NewUser {
                email: "test@gmail.com".into(),
                password: "test".into(),
                username: String::new(),
                first_name: String::new(),
                last_name: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
