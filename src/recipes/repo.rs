use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// Recipe record plus its relation ids, as one row. The id arrays come
/// from correlated subqueries so list responses need no follow-up
/// queries.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub instructions: String,
    pub image: Option<String>,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
}

pub struct NewRecipe<'a> {
    pub title: &'a str,
    pub time_minutes: i32,
    pub price: Decimal,
    pub instructions: &'a str,
}

/// Scalar and relation changes for an update. `None` leaves the field
/// untouched; a `Some` relation list replaces that relation.
#[derive(Default)]
pub struct RecipeChanges<'a> {
    pub title: Option<&'a str>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub instructions: Option<&'a str>,
    pub tag_ids: Option<&'a [i64]>,
    pub ingredient_ids: Option<&'a [i64]>,
}

const SELECT: &str = r#"
    SELECT r.id, r.user_id, r.title, r.time_minutes, r.price, r.instructions, r.image,
           ARRAY(SELECT rt.tag_id FROM recipe_tags rt
                  WHERE rt.recipe_id = r.id ORDER BY rt.tag_id) AS tag_ids,
           ARRAY(SELECT ri.ingredient_id FROM recipe_ingredients ri
                  WHERE ri.recipe_id = r.id ORDER BY ri.ingredient_id) AS ingredient_ids
    FROM recipes r
"#;

/// Owner-scoped list, newest id first. Each filter restricts to recipes
/// whose relation set intersects the given ids; filters combine with AND.
pub async fn list(
    db: &PgPool,
    user_id: i64,
    tag_ids: Option<Vec<i64>>,
    ingredient_ids: Option<Vec<i64>>,
) -> Result<Vec<RecipeRow>, sqlx::Error> {
    let sql = format!(
        r#"{SELECT}
        WHERE r.user_id = $1
          AND ($2::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_tags rt
                 WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
          AND ($3::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_ingredients ri
                 WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
        ORDER BY r.id DESC
        "#
    );
    sqlx::query_as::<_, RecipeRow>(&sql)
        .bind(user_id)
        .bind(tag_ids)
        .bind(ingredient_ids)
        .fetch_all(db)
        .await
}

pub async fn get(
    db: &PgPool,
    user_id: i64,
    recipe_id: i64,
) -> Result<Option<RecipeRow>, sqlx::Error> {
    let sql = format!("{SELECT} WHERE r.id = $1 AND r.user_id = $2");
    sqlx::query_as::<_, RecipeRow>(&sql)
        .bind(recipe_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

/// Insert the recipe and its relation rows in one transaction.
pub async fn create(
    db: &PgPool,
    user_id: i64,
    new: NewRecipe<'_>,
    tag_ids: &[i64],
    ingredient_ids: &[i64],
) -> Result<RecipeRow, sqlx::Error> {
    let mut tx = db.begin().await?;

    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO recipes (user_id, title, time_minutes, price, instructions) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user_id)
    .bind(new.title)
    .bind(new.time_minutes)
    .bind(new.price)
    .bind(new.instructions)
    .fetch_one(&mut *tx)
    .await?;

    let tag_ids = set_relation(&mut tx, "recipe_tags", "tag_id", id, tag_ids).await?;
    let ingredient_ids =
        set_relation(&mut tx, "recipe_ingredients", "ingredient_id", id, ingredient_ids).await?;

    tx.commit().await?;

    Ok(RecipeRow {
        id,
        user_id,
        title: new.title.to_string(),
        time_minutes: new.time_minutes,
        price: new.price,
        instructions: new.instructions.to_string(),
        image: None,
        tag_ids,
        ingredient_ids,
    })
}

/// Apply scalar and relation changes; `None` when the recipe does not
/// exist or is not owned by `user_id`.
pub async fn update(
    db: &PgPool,
    user_id: i64,
    recipe_id: i64,
    changes: RecipeChanges<'_>,
) -> Result<Option<RecipeRow>, sqlx::Error> {
    let mut tx = db.begin().await?;

    let updated: Option<(i64,)> = sqlx::query_as(
        "UPDATE recipes SET \
            title = COALESCE($3, title), \
            time_minutes = COALESCE($4, time_minutes), \
            price = COALESCE($5, price), \
            instructions = COALESCE($6, instructions) \
         WHERE id = $1 AND user_id = $2 \
         RETURNING id",
    )
    .bind(recipe_id)
    .bind(user_id)
    .bind(changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(changes.instructions)
    .fetch_optional(&mut *tx)
    .await?;

    if updated.is_none() {
        return Ok(None);
    }

    if let Some(ids) = changes.tag_ids {
        set_relation(&mut tx, "recipe_tags", "tag_id", recipe_id, ids).await?;
    }
    if let Some(ids) = changes.ingredient_ids {
        set_relation(&mut tx, "recipe_ingredients", "ingredient_id", recipe_id, ids).await?;
    }

    tx.commit().await?;
    get(db, user_id, recipe_id).await
}

/// Persist the stored image key on the recipe.
pub async fn set_image(
    db: &PgPool,
    user_id: i64,
    recipe_id: i64,
    key: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("UPDATE recipes SET image = $3 WHERE id = $1 AND user_id = $2 RETURNING id")
            .bind(recipe_id)
            .bind(user_id)
            .bind(key)
            .fetch_optional(db)
            .await?;
    Ok(row.map(|(id,)| id))
}

/// Delete an owned recipe; join rows cascade. Returns the stored image
/// key (if any) so the caller can drop the object too, or `None` when
/// nothing matched.
pub async fn delete(
    db: &PgPool,
    user_id: i64,
    recipe_id: i64,
) -> Result<Option<Option<String>>, sqlx::Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING image")
            .bind(recipe_id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    Ok(row.map(|(image,)| image))
}

/// Replace a recipe's relation rows. Ids are deduplicated; the sorted
/// set is returned for the response body.
async fn set_relation(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
    recipe_id: i64,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let delete = format!("DELETE FROM {table} WHERE recipe_id = $1");
    sqlx::query(&delete).bind(recipe_id).execute(&mut **tx).await?;

    if !ids.is_empty() {
        let insert =
            format!("INSERT INTO {table} (recipe_id, {column}) SELECT $1, unnest($2::bigint[])");
        sqlx::query(&insert)
            .bind(recipe_id)
            .bind(&ids)
            .execute(&mut **tx)
            .await?;
    }
    Ok(ids)
}
