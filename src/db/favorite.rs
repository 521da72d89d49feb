use super::DBClient;
use crate::error::DbError;
use crate::models::{Favorite, Recipe};
use tracing::instrument;
use uuid::Uuid;

pub trait FavoriteExt {
    async fn add_favorite(&self, user_id: Uuid, recipe_id: i64) -> Result<Favorite, DbError>;
    async fn remove_favorite(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError>;
    async fn is_favorited(&self, user_id: Uuid, recipe_id: i64) -> Result<bool, DbError>;

    /// User's favorite recipes, newest first
    async fn get_favorites(&self, user_id: Uuid) -> Result<Vec<Recipe>, DbError>;

    /// How many users favorited the recipe
    async fn get_favorite_count(&self, recipe_id: i64) -> Result<i64, DbError>;
}

impl FavoriteExt for DBClient {
    #[instrument(skip(self))]
    async fn add_favorite(&self, user_id: Uuid, recipe_id: i64) -> Result<Favorite, DbError> {
        let favorite = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (user_id, recipe_id)
            VALUES ($1, $2)
            RETURNING user_id, recipe_id
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = DbError::from(e);
            tracing::warn!("DB error, saving favorite: {}", err);
            err
        })?;

        Ok(favorite)
    }

    #[instrument(skip(self))]
    async fn remove_favorite(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn is_favorited(&self, user_id: Uuid, recipe_id: i64) -> Result<bool, DbError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND recipe_id = $2)"#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_favorites(&self, user_id: Uuid) -> Result<Vec<Recipe>, DbError> {
        let recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.pub_date, r.image
            FROM favorites f
            INNER JOIN recipes r ON r.id = f.recipe_id
            WHERE f.user_id = $1
            ORDER BY r.pub_date DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipes)
    }

    async fn get_favorite_count(&self, recipe_id: i64) -> Result<i64, DbError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM favorites WHERE recipe_id = $1")
                .bind(recipe_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
