use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::recipes::attrs::Attr;
use crate::recipes::repo::RecipeRow;

/// Query params for the recipe list: comma-separated attribute id lists.
#[derive(Debug, Deserialize)]
pub struct RecipeFilter {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// Parse a comma-separated id list. Empty segments are skipped; anything
/// non-numeric is a validation error.
pub(crate) fn parse_id_list(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::validation(format!("invalid id '{}' in filter", s)))
        })
        .collect()
}

/// Body for POST and PUT. Omitted `tags`/`ingredients` default to empty,
/// which on PUT clears both relations. Scalar fields also default so a
/// missing one fails field validation with a 400, not a body rejection.
#[derive(Debug, Deserialize)]
pub struct RecipeWriteRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time_minutes: i32,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub ingredients: Vec<i64>,
}

/// Body for PATCH; only supplied fields change, and a supplied relation
/// list replaces that relation wholesale.
#[derive(Debug, Deserialize)]
pub struct RecipePatchRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub instructions: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// Minimal-field representation used by list and create responses:
/// tags/ingredients as bare ids.
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub instructions: String,
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

impl From<RecipeRow> for RecipeSummary {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            instructions: row.instructions,
            image: row.image,
            tags: row.tag_ids,
            ingredients: row.ingredient_ids,
        }
    }
}

/// Detail representation: tags/ingredients expanded to full objects.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub instructions: String,
    pub image: Option<String>,
    pub tags: Vec<Attr>,
    pub ingredients: Vec<Attr>,
}

impl RecipeDetail {
    pub fn from_parts(row: RecipeRow, tags: Vec<Attr>, ingredients: Vec<Attr>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            time_minutes: row.time_minutes,
            price: row.price,
            instructions: row.instructions,
            image: row.image,
            tags,
            ingredients,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    pub id: i64,
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_list_accepts_comma_separated_ids() {
        assert_eq!(parse_id_list("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list(" 4 , 5 ").unwrap(), vec![4, 5]);
        assert!(parse_id_list("").unwrap().is_empty());
    }

    #[test]
    fn parse_id_list_rejects_garbage() {
        let err = parse_id_list("1,abc").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn write_request_defaults_relations_to_empty() {
        let req: RecipeWriteRequest = serde_json::from_str(
            r#"{"title": "Marshmellow suit", "time_minutes": 40, "price": "5.00",
                "instructions": "marshmellow bolls..."}"#,
        )
        .unwrap();
        assert!(req.tags.is_empty());
        assert!(req.ingredients.is_empty());
    }

    #[test]
    fn patch_request_distinguishes_absent_from_present() {
        let req: RecipePatchRequest =
            serde_json::from_str(r#"{"title": "Natchos", "tags": [7]}"#).unwrap();
        assert_eq!(req.title.as_deref(), Some("Natchos"));
        assert_eq!(req.tags, Some(vec![7]));
        assert!(req.ingredients.is_none());
        assert!(req.price.is_none());
    }

    #[test]
    fn summary_serializes_price_as_exact_string() {
        let summary = RecipeSummary {
            id: 1,
            title: "Macarone".into(),
            time_minutes: 5,
            price: Decimal::new(2000, 2),
            instructions: "ferve in water".into(),
            image: None,
            tags: vec![1, 2],
            ingredients: vec![],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""price":"20.00""#));
        assert!(json.contains(r#""tags":[1,2]"#));
    }
}
