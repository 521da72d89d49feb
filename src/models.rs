use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User role enumeration
///
/// Stored in PostgreSQL as the `user_role` ENUM type, variants lowercased
/// (`Admin` -> "admin").
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

/// User model representing the users table
///
/// `password` always holds an argon2 PHC string, never the plain text.
/// `is_staff` and `is_superuser` are elevated account statuses that grant
/// admin rights independently of `role`.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_user(&self) -> bool {
        self.role == UserRole::User
    }

    /// True when the role is admin or the account carries staff/superuser status.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin || self.is_superuser || self.is_staff
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

/// Subscription junction row: `subscriber_id` follows `user_id`.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: Uuid,
    pub subscriber_id: Uuid,
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {}", self.user_id, self.subscriber_id)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Recipe model representing the recipes table
///
/// `pub_date` is assigned by the database on insert and never written again
/// (a trigger rejects updates to it). `image` is an optional reference to the
/// uploaded thumbnail, not the image bytes.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Recipe {
    pub id: i64,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Junction row between a recipe and an ingredient, carrying the amount.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub amount: i32,
}

impl fmt::Display for RecipeIngredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} >> {} >> {}",
            self.recipe_id, self.ingredient_id, self.amount
        )
    }
}

/// Ingredient of a recipe joined with its catalogue entry
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct RecipeIngredientLine {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl fmt::Display for RecipeIngredientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {} {}", self.name, self.amount, self.measurement_unit)
    }
}

/// A recipe with every relation resolved
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub author: User,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredientLine>,
}

impl fmt::Display for RecipeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.ingredients {
            write!(f, "{} >> {} >> {}", self.recipe, line.name, line.amount)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct Favorite {
    pub user_id: Uuid,
    pub recipe_id: i64,
}

impl fmt::Display for Favorite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >> {}", self.user_id, self.recipe_id)
    }
}

/// One shopping cart per user; its recipes live in `shopping_cart_recipes`.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct ShoppingCart {
    pub id: i64,
    pub user_id: Uuid,
}

impl fmt::Display for ShoppingCart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_id)
    }
}

/// Ingredient total across every recipe in a shopping cart
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

impl fmt::Display for ShoppingListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.name, self.measurement_unit, self.total_amount
        )
    }
}
