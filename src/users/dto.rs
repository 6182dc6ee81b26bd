use serde::{Deserialize, Serialize};

use crate::users::repo::User;

/// Request body for POST /user/create. Required fields default to empty
/// strings so that a missing field fails validation with a 400 rather
/// than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Request body for POST /user/token. Fields default to empty so a
/// missing field fails the same way as a wrong one.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Request body for PATCH /user/me; only supplied fields change.
#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Profile fields returned to the client. Never carries the password or
/// its hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_has_no_password_field() {
        let response = UserResponse {
            id: 1,
            email: "test@gmail.com".into(),
            username: "name".into(),
            first_name: "test".into(),
            last_name: "case".into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@gmail.com"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn token_request_defaults_missing_fields_to_empty() {
        let req: TokenRequest = serde_json::from_str(r#"{"email": "a@b.co"}"#).unwrap();
        assert_eq!(req.email, "a@b.co");
        assert!(req.password.is_empty());
    }
}
