use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{
    dto::{CreateUserRequest, TokenRequest, TokenResponse, UpdateMeRequest, UserResponse},
    repo::User,
    services,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/token", post(create_token))
        .route(
            "/me",
            get(me).patch(update_me).fallback(method_not_allowed),
        )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = services::create_user(
        &state.db,
        services::NewUser {
            email: payload.email,
            password: payload.password,
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
        },
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
async fn create_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation(
            "unable to authenticate with provided credentials",
        ));
    }

    let user = services::authenticate(&state.db, &payload.email, &payload.password).await?;
    let token = services::issue_token(&state.db, &user).await?;

    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = match payload.email.as_deref() {
        Some(raw) => {
            let email = services::normalize_email(raw);
            if email.is_empty() {
                return Err(ApiError::validation("users must have an email"));
            }
            if !services::is_valid_email(&email) {
                return Err(ApiError::validation("invalid email"));
            }
            Some(email)
        }
        None => None,
    };

    let password_hash = match payload.password.as_deref() {
        Some(plain) => {
            if plain.len() < services::MIN_PASSWORD_LEN {
                return Err(ApiError::validation(format!(
                    "password must be at least {} characters",
                    services::MIN_PASSWORD_LEN
                )));
            }
            Some(services::hash_password(plain)?)
        }
        None => None,
    };

    let user = User::update_profile(
        &state.db,
        user_id,
        email.as_deref(),
        password_hash.as_deref(),
        payload.username.as_deref(),
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(user.into()))
}
