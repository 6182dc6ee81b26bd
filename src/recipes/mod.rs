pub mod attrs;
mod dto;
pub mod handlers;
pub mod images;
pub mod repo;

use axum::{routing::get, Router};

use crate::recipes::attrs::{create_attr, list_attrs, IngredientKind, TagKind};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/tags",
            get(list_attrs::<TagKind>).post(create_attr::<TagKind>),
        )
        .route(
            "/ingredients",
            get(list_attrs::<IngredientKind>).post(create_attr::<IngredientKind>),
        )
        .merge(handlers::recipe_routes())
}
