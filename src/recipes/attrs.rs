use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Table metadata for an attribute kind. Tags and ingredients share all
/// list/create behavior; the table and join names are the only thing
/// that differs, so the handlers and queries are written once and
/// instantiated per kind.
pub trait AttrKind: Send + Sync + 'static {
    /// Attribute table name.
    const TABLE: &'static str;
    /// Recipe join table name.
    const JOIN_TABLE: &'static str;
    /// Attribute FK column inside the join table.
    const JOIN_COLUMN: &'static str;
    /// Singular noun for log and error messages.
    const NOUN: &'static str;
}

pub enum TagKind {}

impl AttrKind for TagKind {
    const TABLE: &'static str = "tags";
    const JOIN_TABLE: &'static str = "recipe_tags";
    const JOIN_COLUMN: &'static str = "tag_id";
    const NOUN: &'static str = "tag";
}

pub enum IngredientKind {}

impl AttrKind for IngredientKind {
    const TABLE: &'static str = "ingredients";
    const JOIN_TABLE: &'static str = "recipe_ingredients";
    const JOIN_COLUMN: &'static str = "ingredient_id";
    const NOUN: &'static str = "ingredient";
}

/// A tag or ingredient as exposed to the client.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attr {
    pub id: i64,
    pub name: String,
}

/// List the owner's attributes, name descending. With `assigned_only`,
/// restrict to attributes linked to at least one recipe; an attribute on
/// several recipes still appears once.
pub async fn list<K: AttrKind>(
    db: &PgPool,
    user_id: i64,
    assigned_only: bool,
) -> Result<Vec<Attr>, sqlx::Error> {
    let sql = if assigned_only {
        format!(
            "SELECT DISTINCT a.id, a.name FROM {table} a \
             JOIN {join} j ON j.{col} = a.id \
             WHERE a.user_id = $1 \
             ORDER BY a.name DESC",
            table = K::TABLE,
            join = K::JOIN_TABLE,
            col = K::JOIN_COLUMN,
        )
    } else {
        format!(
            "SELECT id, name FROM {} WHERE user_id = $1 ORDER BY name DESC",
            K::TABLE
        )
    };
    sqlx::query_as::<_, Attr>(&sql).bind(user_id).fetch_all(db).await
}

pub async fn create<K: AttrKind>(
    db: &PgPool,
    user_id: i64,
    name: &str,
) -> Result<Attr, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, name",
        K::TABLE
    );
    sqlx::query_as::<_, Attr>(&sql)
        .bind(user_id)
        .bind(name)
        .fetch_one(db)
        .await
}

/// Full attribute objects linked to one recipe, for the detail view.
pub async fn for_recipe<K: AttrKind>(
    db: &PgPool,
    recipe_id: i64,
) -> Result<Vec<Attr>, sqlx::Error> {
    let sql = format!(
        "SELECT a.id, a.name FROM {table} a \
         JOIN {join} j ON j.{col} = a.id \
         WHERE j.recipe_id = $1 \
         ORDER BY a.id",
        table = K::TABLE,
        join = K::JOIN_TABLE,
        col = K::JOIN_COLUMN,
    );
    sqlx::query_as::<_, Attr>(&sql)
        .bind(recipe_id)
        .fetch_all(db)
        .await
}

/// True when every id references an attribute owned by `user_id`.
/// Referencing someone else's attribute is indistinguishable from
/// referencing a nonexistent one.
pub async fn all_owned<K: AttrKind>(
    db: &PgPool,
    user_id: i64,
    ids: &[i64],
) -> Result<bool, sqlx::Error> {
    if ids.is_empty() {
        return Ok(true);
    }
    let sql = format!(
        "SELECT COUNT(DISTINCT id) FROM {} WHERE user_id = $1 AND id = ANY($2)",
        K::TABLE
    );
    let (owned,): (i64,) = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(ids)
        .fetch_one(db)
        .await?;

    let distinct = {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    };
    Ok(owned as usize == distinct)
}

#[derive(Debug, Deserialize)]
pub struct AttrFilter {
    assigned_only: Option<u8>,
}

impl AttrFilter {
    fn assigned_only(&self) -> bool {
        matches!(self.assigned_only, Some(v) if v != 0)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAttrRequest {
    #[serde(default)]
    pub name: String,
}

#[instrument(skip(state))]
pub async fn list_attrs<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(filter): Query<AttrFilter>,
) -> Result<Json<Vec<Attr>>, ApiError> {
    let attrs = list::<K>(&state.db, user_id, filter.assigned_only()).await?;
    Ok(Json(attrs))
}

#[instrument(skip(state, payload))]
pub async fn create_attr<K: AttrKind>(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateAttrRequest>,
) -> Result<(StatusCode, Json<Attr>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation(format!(
            "{} name must not be empty",
            K::NOUN
        )));
    }

    let attr = create::<K>(&state.db, user_id, name).await?;
    info!(user_id = %user_id, id = %attr.id, "{} created", K::NOUN);
    Ok((StatusCode::CREATED, Json(attr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_carry_their_tables() {
        assert_eq!(TagKind::TABLE, "tags");
        assert_eq!(TagKind::JOIN_COLUMN, "tag_id");
        assert_eq!(IngredientKind::TABLE, "ingredients");
        assert_eq!(IngredientKind::JOIN_TABLE, "recipe_ingredients");
    }

    #[test]
    fn assigned_only_is_off_by_default_and_truthy_on_nonzero() {
        assert!(!AttrFilter { assigned_only: None }.assigned_only());
        assert!(!AttrFilter { assigned_only: Some(0) }.assigned_only());
        assert!(AttrFilter { assigned_only: Some(1) }.assigned_only());
    }

    #[tokio::test]
    async fn all_owned_accepts_empty_id_list_without_a_query() {
        let state = crate::state::AppState::fake();
        assert!(all_owned::<TagKind>(&state.db, 1, &[]).await.unwrap());
    }
}
