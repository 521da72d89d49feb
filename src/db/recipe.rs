use super::DBClient;
use crate::dtos::{NewRecipeDto, RecipeFilterDto};
use crate::error::DbError;
use crate::models::{Recipe, RecipeDetail, RecipeIngredientLine, Tag, User};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Recipe database operations trait
///
/// Recipes own their tag links and ingredient lines: create and update write
/// all three in one transaction, and deleting a recipe cascades to both
/// junction tables as well as favorites and cart entries.
pub trait RecipeExt {
    async fn create_recipe(
        &self,
        author_id: Uuid,
        recipe: &NewRecipeDto,
    ) -> Result<RecipeDetail, DbError>;

    async fn get_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>, DbError>;

    /// Recipe with author, tags and ingredient lines
    async fn get_recipe_detail(&self, recipe_id: i64) -> Result<Option<RecipeDetail>, DbError>;

    /// Newest first, narrowed by every filter that is set
    async fn get_recipes(&self, filter: &RecipeFilterDto) -> Result<Vec<Recipe>, DbError>;

    /// Total matching `filter`, ignoring pagination
    async fn get_recipe_count(&self, filter: &RecipeFilterDto) -> Result<i64, DbError>;

    /// Replace fields, tags and ingredient lines (author only); pub_date is kept
    async fn update_recipe(
        &self,
        recipe_id: i64,
        author_id: Uuid,
        recipe: &NewRecipeDto,
    ) -> Result<RecipeDetail, DbError>;

    /// Delete recipe (author only)
    async fn delete_recipe(&self, recipe_id: i64, author_id: Uuid) -> Result<(), DbError>;
}

impl RecipeExt for DBClient {
    #[instrument(skip(self, recipe), fields(name = %recipe.name))]
    async fn create_recipe(
        &self,
        author_id: Uuid,
        recipe: &NewRecipeDto,
    ) -> Result<RecipeDetail, DbError> {
        recipe.validate()?;

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, name, text, cooking_time, pub_date, image
            "#,
        )
        .bind(author_id)
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .bind(&recipe.image)
        .fetch_one(&mut *tx)
        .await
        .map_err(log_write_error)?;

        insert_relations(&mut tx, created.id, recipe)
            .await
            .map_err(log_write_error)?;

        let detail = fetch_detail(&mut tx, created).await?;
        tx.commit().await?;

        tracing::info!(recipe_id = detail.recipe.id, "Recipe created");
        Ok(detail)
    }

    async fn get_recipe(&self, recipe_id: i64) -> Result<Option<Recipe>, DbError> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, author_id, name, text, cooking_time, pub_date, image
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(recipe)
    }

    async fn get_recipe_detail(&self, recipe_id: i64) -> Result<Option<RecipeDetail>, DbError> {
        let Some(recipe) = self.get_recipe(recipe_id).await? else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let detail = fetch_detail(&mut conn, recipe).await?;

        Ok(Some(detail))
    }

    async fn get_recipes(&self, filter: &RecipeFilterDto) -> Result<Vec<Recipe>, DbError> {
        filter.validate()?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.pub_date, r.image FROM recipes r WHERE TRUE",
        );
        push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(filter.pagination.limit())
            .push(" OFFSET ")
            .push_bind(filter.pagination.offset());

        let recipes = builder
            .build_query_as::<Recipe>()
            .fetch_all(&self.pool)
            .await?;

        Ok(recipes)
    }

    async fn get_recipe_count(&self, filter: &RecipeFilterDto) -> Result<i64, DbError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_filters(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self, recipe), fields(name = %recipe.name))]
    async fn update_recipe(
        &self,
        recipe_id: i64,
        author_id: Uuid,
        recipe: &NewRecipeDto,
    ) -> Result<RecipeDetail, DbError> {
        recipe.validate()?;

        let mut tx = self.pool.begin().await?;

        // Update only if the user authored the recipe
        let updated = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
            SET name = $1, text = $2, cooking_time = $3, image = $4
            WHERE id = $5 AND author_id = $6
            RETURNING id, author_id, name, text, cooking_time, pub_date, image
            "#,
        )
        .bind(&recipe.name)
        .bind(&recipe.text)
        .bind(recipe.cooking_time)
        .bind(&recipe.image)
        .bind(recipe_id)
        .bind(author_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(log_write_error)?
        .ok_or(DbError::NotFound)?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;

        insert_relations(&mut tx, recipe_id, recipe)
            .await
            .map_err(log_write_error)?;

        let detail = fetch_detail(&mut tx, updated).await?;
        tx.commit().await?;

        Ok(detail)
    }

    #[instrument(skip(self))]
    async fn delete_recipe(&self, recipe_id: i64, author_id: Uuid) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND author_id = $2")
            .bind(recipe_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        // Return NotFound if recipe doesn't exist or user doesn't own it
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}

fn log_write_error(e: sqlx::Error) -> DbError {
    let err = DbError::from(e);
    tracing::warn!("DB error, saving recipe: {}", err);
    err
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilterDto) {
    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(user_id) = filter.favorited_by {
        builder
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }

    if let Some(user_id) = filter.in_cart_of {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM shopping_cart_recipes scr INNER JOIN shopping_carts sc ON sc.id = scr.cart_id WHERE scr.recipe_id = r.id AND sc.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
    }
}

/// Write tag links and ingredient lines for a recipe.
async fn insert_relations(
    conn: &mut PgConnection,
    recipe_id: i64,
    recipe: &NewRecipeDto,
) -> Result<(), sqlx::Error> {
    if !recipe.tags.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        builder.push_values(&recipe.tags, |mut row, tag_id| {
            row.push_bind(recipe_id).push_bind(*tag_id);
        });
        builder.build().execute(&mut *conn).await?;
    }

    if !recipe.ingredients.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
        builder.push_values(&recipe.ingredients, |mut row, line| {
            row.push_bind(recipe_id)
                .push_bind(line.ingredient_id)
                .push_bind(line.amount);
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

async fn fetch_detail(conn: &mut PgConnection, recipe: Recipe) -> Result<RecipeDetail, DbError> {
    let author = sqlx::query_as::<_, User>(
        r#"SELECT id, username, email, password, first_name, last_name, role, is_staff, is_superuser, date_joined FROM users WHERE id = $1"#,
    )
    .bind(recipe.author_id)
    .fetch_one(&mut *conn)
    .await?;

    let tags = sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(recipe.id)
    .fetch_all(&mut *conn)
    .await?;

    let ingredients = sqlx::query_as::<_, RecipeIngredientLine>(
        r#"
        SELECT i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(recipe.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(RecipeDetail {
        recipe,
        author,
        tags,
        ingredients,
    })
}
