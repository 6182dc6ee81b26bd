use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::recipes::{
    attrs::{self, IngredientKind, TagKind},
    dto::{
        parse_id_list, ImageUploadResponse, RecipeDetail, RecipeFilter, RecipePatchRequest,
        RecipeSummary, RecipeWriteRequest,
    },
    images, repo,
};
use crate::state::AppState;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(put_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(images::MAX_IMAGE_BYTES)),
        )
}

fn validate_scalars(
    title: &str,
    time_minutes: i32,
    price: Decimal,
    instructions: &str,
) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if time_minutes <= 0 {
        return Err(ApiError::validation("time_minutes must be positive"));
    }
    if price < Decimal::ZERO {
        return Err(ApiError::validation("price must not be negative"));
    }
    if instructions.trim().is_empty() {
        return Err(ApiError::validation("instructions must not be empty"));
    }
    Ok(())
}

/// Referenced attribute ids must each resolve to one of the caller's own
/// tags/ingredients.
async fn check_relations_owned(
    state: &AppState,
    user_id: i64,
    tag_ids: &[i64],
    ingredient_ids: &[i64],
) -> Result<(), ApiError> {
    if !attrs::all_owned::<TagKind>(&state.db, user_id, tag_ids).await? {
        return Err(ApiError::validation("tags must reference your own tags"));
    }
    if !attrs::all_owned::<IngredientKind>(&state.db, user_id, ingredient_ids).await? {
        return Err(ApiError::validation(
            "ingredients must reference your own ingredients",
        ));
    }
    Ok(())
}

#[instrument(skip(state))]
async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(filter): Query<RecipeFilter>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let tag_ids = filter
        .tags
        .as_deref()
        .map(parse_id_list)
        .transpose()?
        .filter(|ids| !ids.is_empty());
    let ingredient_ids = filter
        .ingredients
        .as_deref()
        .map(parse_id_list)
        .transpose()?
        .filter(|ids| !ids.is_empty());

    let rows = repo::list(&state.db, user_id, tag_ids, ingredient_ids).await?;
    Ok(Json(rows.into_iter().map(RecipeSummary::from).collect()))
}

#[instrument(skip(state))]
async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let row = repo::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    let tags = attrs::for_recipe::<TagKind>(&state.db, row.id).await?;
    let ingredients = attrs::for_recipe::<IngredientKind>(&state.db, row.id).await?;
    Ok(Json(RecipeDetail::from_parts(row, tags, ingredients)))
}

#[instrument(skip(state, payload))]
async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RecipeWriteRequest>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    validate_scalars(
        &payload.title,
        payload.time_minutes,
        payload.price,
        &payload.instructions,
    )?;
    check_relations_owned(&state, user_id, &payload.tags, &payload.ingredients).await?;

    let row = repo::create(
        &state.db,
        user_id,
        repo::NewRecipe {
            title: &payload.title,
            time_minutes: payload.time_minutes,
            price: payload.price,
            instructions: &payload.instructions,
        },
        &payload.tags,
        &payload.ingredients,
    )
    .await?;

    info!(user_id = %user_id, recipe_id = %row.id, "recipe created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Full replace. Omitted `tags`/`ingredients` keys deserialize to empty
/// lists, which clears both relations.
#[instrument(skip(state, payload))]
async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeWriteRequest>,
) -> Result<Json<RecipeSummary>, ApiError> {
    validate_scalars(
        &payload.title,
        payload.time_minutes,
        payload.price,
        &payload.instructions,
    )?;
    check_relations_owned(&state, user_id, &payload.tags, &payload.ingredients).await?;

    let row = repo::update(
        &state.db,
        user_id,
        id,
        repo::RecipeChanges {
            title: Some(&payload.title),
            time_minutes: Some(payload.time_minutes),
            price: Some(payload.price),
            instructions: Some(&payload.instructions),
            tag_ids: Some(&payload.tags),
            ingredient_ids: Some(&payload.ingredients),
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    info!(user_id = %user_id, recipe_id = %id, "recipe replaced");
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RecipePatchRequest>,
) -> Result<Json<RecipeSummary>, ApiError> {
    if let Some(title) = payload.title.as_deref() {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }
    }
    if let Some(minutes) = payload.time_minutes {
        if minutes <= 0 {
            return Err(ApiError::validation("time_minutes must be positive"));
        }
    }
    if let Some(price) = payload.price {
        if price < Decimal::ZERO {
            return Err(ApiError::validation("price must not be negative"));
        }
    }
    if let Some(instructions) = payload.instructions.as_deref() {
        if instructions.trim().is_empty() {
            return Err(ApiError::validation("instructions must not be empty"));
        }
    }
    check_relations_owned(
        &state,
        user_id,
        payload.tags.as_deref().unwrap_or(&[]),
        payload.ingredients.as_deref().unwrap_or(&[]),
    )
    .await?;

    let row = repo::update(
        &state.db,
        user_id,
        id,
        repo::RecipeChanges {
            title: payload.title.as_deref(),
            time_minutes: payload.time_minutes,
            price: payload.price,
            instructions: payload.instructions.as_deref(),
            tag_ids: payload.tags.as_deref(),
            ingredient_ids: payload.ingredients.as_deref(),
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    info!(user_id = %user_id, recipe_id = %id, "recipe updated");
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let image = repo::delete(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    if let Some(key) = image {
        // The row is gone either way; a stale object is not worth a 500.
        if let Err(err) = state.storage.delete_object(&key).await {
            warn!(error = %err, key = %key, "failed to delete image object");
        }
    }

    info!(user_id = %user_id, recipe_id = %id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, multipart))]
async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    // Resolve ownership before accepting the payload.
    repo::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    let mut upload: Option<(Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart payload: {}", e)))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("failed to read image field: {}", e)))?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::validation("image field is required"))?;
    if data.len() > images::MAX_IMAGE_BYTES {
        return Err(ApiError::validation("image too large"));
    }

    let key = images::store(state.storage.as_ref(), filename.as_deref(), data).await?;
    repo::set_image(&state.db, user_id, id, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("recipe not found"))?;

    info!(user_id = %user_id, recipe_id = %id, key = %key, "image uploaded");
    Ok(Json(ImageUploadResponse { id, image: key }))
}
