mod dto;
pub mod handlers;
pub mod repo;
pub mod services;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
