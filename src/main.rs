mod app;
mod auth;
mod config;
mod error;
mod recipes;
mod state;
mod storage;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipebook=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&state.db).await?;

    bootstrap_superuser(&state).await?;

    let app = app::build_app(state);
    app::serve(app).await
}

/// Create the configured superuser on first start, so a fresh deploy has
/// an elevated account without any manual SQL.
async fn bootstrap_superuser(state: &AppState) -> anyhow::Result<()> {
    let (email, password) = match (
        std::env::var("BOOTSTRAP_SUPERUSER_EMAIL"),
        std::env::var("BOOTSTRAP_SUPERUSER_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => (email, password),
        _ => return Ok(()),
    };

    if users::repo::User::find_by_email(&state.db, &email).await?.is_some() {
        tracing::debug!("bootstrap superuser already exists");
        return Ok(());
    }

    let user = users::services::create_superuser(&state.db, &email, &password).await?;
    tracing::info!(user_id = %user.id, "bootstrap superuser created");
    Ok(())
}
