use std::path::Path;

use thiserror::Error;
use validator::Validate;

use crate::db::{DBClient, IngredientExt};
use crate::dtos::NewIngredientDto;
use crate::error::DbError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid ingredient catalogue: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Parse a JSON array of `{"name": ..., "measurement_unit": ...}` objects.
pub fn parse_ingredients(json: &str) -> Result<Vec<NewIngredientDto>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Keep the entries that pass validation, logging the rest.
pub fn valid_ingredients(ingredients: Vec<NewIngredientDto>) -> Vec<NewIngredientDto> {
    ingredients
        .into_iter()
        .filter(|ingredient| match ingredient.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(name = %ingredient.name, "Skipping invalid ingredient: {}", e);
                false
            }
        })
        .collect()
}

/// Import an ingredient catalogue file. Returns the number of new rows.
pub async fn load_ingredients_file(
    db_client: &DBClient,
    path: impl AsRef<Path>,
) -> Result<u64, LoadError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let parsed = parse_ingredients(&contents)?;
    let total = parsed.len();
    let ingredients = valid_ingredients(parsed);

    let inserted = db_client.import_ingredients(&ingredients).await?;
    tracing::info!(
        path = %path.display(),
        total,
        valid = ingredients.len(),
        inserted,
        "Ingredient catalogue loaded"
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn parses_catalogue() {
        let json = r#"[
            {"name": "абрикосовое варенье", "measurement_unit": "г"},
            {"name": "salt", "measurement_unit": "g"}
        ]"#;
        let parsed = parse_ingredients(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].measurement_unit, "г");
        assert_eq!(parsed[1].name, "salt");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_ingredients(r#"[{"name": "salt"}]"#).is_err());
        assert!(parse_ingredients("{}").is_err());
    }

    #[test]
    fn drops_invalid_entries() {
        let parsed = parse_ingredients(
            r#"[
                {"name": "", "measurement_unit": "g"},
                {"name": "pepper", "measurement_unit": "g"}
            ]"#,
        )
        .unwrap();
        let valid = valid_ingredients(parsed);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "pepper");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        // connect_lazy never touches the network until a query runs
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let db = DBClient::new(pool);

        let err = load_ingredients_file(&db, "does/not/exist.json")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn loads_bundled_catalogue(pool: PgPool) {
        let db = DBClient::new(pool);
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/ingredients.json");

        let first = load_ingredients_file(&db, path).await.unwrap();
        assert!(first > 0);

        // a second run finds every pair already present
        assert_eq!(load_ingredients_file(&db, path).await.unwrap(), 0);
    }
}
