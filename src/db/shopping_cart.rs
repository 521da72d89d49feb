use super::DBClient;
use crate::error::DbError;
use crate::models::{Recipe, ShoppingCart, ShoppingListItem};
use tracing::instrument;
use uuid::Uuid;

/// Shopping cart operations. Every user has at most one cart, created on
/// first use; the cart holds a set of recipes.
pub trait ShoppingCartExt {
    /// Fetch the user's cart, creating it if missing
    async fn get_or_create_cart(&self, user_id: Uuid) -> Result<ShoppingCart, DbError>;

    async fn add_to_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError>;
    async fn remove_from_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError>;
    async fn is_in_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<bool, DbError>;
    async fn get_cart_recipes(&self, user_id: Uuid) -> Result<Vec<Recipe>, DbError>;

    /// Empty the cart, returning how many recipes were removed
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, DbError>;

    /// Sum of every ingredient over the recipes in the cart, by (name, unit)
    async fn get_shopping_list(&self, user_id: Uuid) -> Result<Vec<ShoppingListItem>, DbError>;
}

impl ShoppingCartExt for DBClient {
    async fn get_or_create_cart(&self, user_id: Uuid) -> Result<ShoppingCart, DbError> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let cart = sqlx::query_as::<_, ShoppingCart>(
            r#"
            INSERT INTO shopping_carts (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(cart)
    }

    #[instrument(skip(self))]
    async fn add_to_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError> {
        let cart = self.get_or_create_cart(user_id).await?;

        sqlx::query("INSERT INTO shopping_cart_recipes (cart_id, recipe_id) VALUES ($1, $2)")
            .bind(cart.id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                let err = DbError::from(e);
                tracing::warn!("DB error, adding recipe to cart: {}", err);
                err
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_from_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM shopping_cart_recipes scr
            USING shopping_carts sc
            WHERE scr.cart_id = sc.id AND sc.user_id = $1 AND scr.recipe_id = $2
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn is_in_cart(&self, user_id: Uuid, recipe_id: i64) -> Result<bool, DbError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM shopping_cart_recipes scr
                INNER JOIN shopping_carts sc ON sc.id = scr.cart_id
                WHERE sc.user_id = $1 AND scr.recipe_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_cart_recipes(&self, user_id: Uuid) -> Result<Vec<Recipe>, DbError> {
        let recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.pub_date, r.image
            FROM shopping_cart_recipes scr
            INNER JOIN shopping_carts sc ON sc.id = scr.cart_id
            INNER JOIN recipes r ON r.id = scr.recipe_id
            WHERE sc.user_id = $1
            ORDER BY r.pub_date DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipes)
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM shopping_cart_recipes scr
            USING shopping_carts sc
            WHERE scr.cart_id = sc.id AND sc.user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_shopping_list(&self, user_id: Uuid) -> Result<Vec<ShoppingListItem>, DbError> {
        let items = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total_amount
            FROM shopping_carts sc
            INNER JOIN shopping_cart_recipes scr ON scr.cart_id = sc.id
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = scr.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE sc.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
