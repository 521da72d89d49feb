use sqlx::{Pool, Postgres};

mod user;
pub use user::UserExt;

mod subscription;
pub use subscription::SubscriptionExt;

mod tag;
pub use tag::TagExt;

mod ingredient;
pub use ingredient::IngredientExt;

mod recipe;
pub use recipe::RecipeExt;

mod favorite;
pub use favorite::FavoriteExt;

mod shopping_cart;
pub use shopping_cart::ShoppingCartExt;

/// Embedded schema migrations from `./migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Apply every pending migration.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

/// Fixtures shared by the database tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::{DBClient, IngredientExt, RecipeExt, TagExt, UserExt};
    use crate::dtos::{NewIngredientDto, NewRecipeDto, NewTagDto, NewUserDto, RecipeIngredientDto};
    use crate::models::{Ingredient, RecipeDetail, Tag, User};

    pub async fn user(db: &DBClient, username: &str) -> User {
        db.create_user(&NewUserDto {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
            first_name: "Test".to_string(),
            last_name: "Cook".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    pub async fn tag(db: &DBClient, slug: &str) -> Tag {
        db.create_tag(&NewTagDto::new(slug.to_uppercase(), slug))
            .await
            .unwrap()
    }

    pub async fn ingredient(db: &DBClient, name: &str, unit: &str) -> Ingredient {
        db.create_ingredient(&NewIngredientDto {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        })
        .await
        .unwrap()
    }

    pub fn recipe_input(name: &str, tags: &[&Tag], lines: &[(&Ingredient, i32)]) -> NewRecipeDto {
        NewRecipeDto {
            name: name.to_string(),
            text: format!("How to make {name}"),
            cooking_time: 30,
            image: None,
            tags: tags.iter().map(|t| t.id).collect(),
            ingredients: lines
                .iter()
                .map(|(ingredient, amount)| RecipeIngredientDto {
                    ingredient_id: ingredient.id,
                    amount: *amount,
                })
                .collect(),
        }
    }

    pub async fn recipe(
        db: &DBClient,
        author: &User,
        name: &str,
        tags: &[&Tag],
        lines: &[(&Ingredient, i32)],
    ) -> RecipeDetail {
        db.create_recipe(author.id, &recipe_input(name, tags, lines))
            .await
            .unwrap()
    }
}
