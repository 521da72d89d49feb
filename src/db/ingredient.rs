use super::DBClient;
use crate::dtos::NewIngredientDto;
use crate::error::DbError;
use crate::models::Ingredient;
use crate::validation::escape_like;
use sqlx::{Postgres, QueryBuilder};
use std::borrow::Cow;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

/// Largest page `search_ingredients` returns.
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Rows per INSERT when importing; two binds per row keeps well under the
/// 65535 parameter limit.
const IMPORT_CHUNK_SIZE: usize = 1000;

pub trait IngredientExt {
    async fn create_ingredient(&self, ingredient: &NewIngredientDto)
    -> Result<Ingredient, DbError>;

    async fn get_ingredient(&self, ingredient_id: i64) -> Result<Option<Ingredient>, DbError>;

    /// Case-insensitive prefix match on the name, ordered by name;
    /// `limit` must lie in `1..=MAX_SEARCH_LIMIT`
    async fn search_ingredients(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Ingredient>, DbError>;

    async fn delete_ingredient(&self, ingredient_id: i64) -> Result<(), DbError>;

    /// Bulk insert; pairs already present are skipped. Returns inserted row count.
    async fn import_ingredients(&self, ingredients: &[NewIngredientDto]) -> Result<u64, DbError>;
}

impl IngredientExt for DBClient {
    #[instrument(skip(self, ingredient), fields(name = %ingredient.name))]
    async fn create_ingredient(
        &self,
        ingredient: &NewIngredientDto,
    ) -> Result<Ingredient, DbError> {
        ingredient.validate()?;

        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            RETURNING id, name, measurement_unit
            "#,
        )
        .bind(&ingredient.name)
        .bind(&ingredient.measurement_unit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            tracing::warn!("DB error, saving ingredient: {}", err);
            err
        })?;

        Ok(ingredient)
    }

    async fn get_ingredient(&self, ingredient_id: i64) -> Result<Option<Ingredient>, DbError> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(ingredient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    async fn search_ingredients(
        &self,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<Ingredient>, DbError> {
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            let mut errors = ValidationErrors::new();
            errors.add(
                "limit",
                ValidationError::new("range").with_message(Cow::Borrowed(
                    "Search limit must be between 1 and 100",
                )),
            );
            return Err(errors.into());
        }

        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));

        let ingredients = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE lower(name) LIKE $1
            ORDER BY name, measurement_unit
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ingredients)
    }

    #[instrument(skip(self))]
    async fn delete_ingredient(&self, ingredient_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(ingredient_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    #[instrument(skip(self, ingredients), fields(count = ingredients.len()))]
    async fn import_ingredients(&self, ingredients: &[NewIngredientDto]) -> Result<u64, DbError> {
        for ingredient in ingredients {
            ingredient.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in ingredients.chunks(IMPORT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
            builder.push_values(chunk, |mut row, ingredient| {
                row.push_bind(&ingredient.name)
                    .push_bind(&ingredient.measurement_unit);
            });
            builder.push(" ON CONFLICT (name, measurement_unit) DO NOTHING");

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        tracing::info!(inserted, "Ingredients imported");
        Ok(inserted)
    }
}
