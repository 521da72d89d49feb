use crate::models::UserRole;
use crate::validation::{validate_color, validate_slug, validate_username};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// Write inputs are validated here before any SQL is issued. Lengths are
// counted in characters, matching the VARCHAR limits in migrations/.

// ============================================================================
// User DTOs
// ============================================================================

/// New account. `password` is the plain text; it is hashed before storage.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct NewUserDto {
    #[validate(
        length(min = 1, max = 40, message = "Username must be 1-40 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(
        length(min = 1, max = 100, message = "Email must be 1-100 characters"),
        email(message = "Email is invalid")
    )]
    pub email: String,

    #[validate(length(min = 1, max = 64, message = "Password must be 1-64 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: String,

    #[serde(default)]
    pub role: UserRole,

    #[serde(default)]
    pub is_staff: bool,

    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct PasswordUpdateDto {
    #[validate(length(min = 1, max = 64, message = "Password must be 1-64 characters"))]
    pub new_password: String,
}

// ============================================================================
// Catalogue DTOs
// ============================================================================

fn default_color() -> String {
    "F5F5FF".to_string()
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct NewTagDto {
    #[validate(length(min = 1, max = 50, message = "Tag name must be 1-50 characters"))]
    pub name: String,

    #[validate(custom(function = "validate_color"))]
    #[serde(default = "default_color")]
    pub color: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be 1-50 characters"),
        custom(function = "validate_slug")
    )]
    pub slug: String,
}

impl NewTagDto {
    /// Tag with the default color.
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        NewTagDto {
            name: name.into(),
            color: default_color(),
            slug: slug.into(),
        }
    }
}

/// Also the element type of the ingredient catalogue JSON file.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIngredientDto {
    #[validate(length(min = 1, max = 150, message = "Ingredient name must be 1-150 characters"))]
    pub name: String,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Measurement unit must be 1-50 characters"
    ))]
    pub measurement_unit: String,
}

// ============================================================================
// Recipe DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RecipeIngredientDto {
    #[serde(rename = "id")]
    pub ingredient_id: i64,

    #[validate(range(min = 1, message = "Amount must be at least 1"))]
    pub amount: i32,
}

/// Recipe create/update input. `tags` are tag ids; ingredient lines are
/// unique per ingredient (a repeated id is a uniqueness violation).
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct NewRecipeDto {
    #[validate(length(min = 1, max = 250, message = "Recipe name must be 1-250 characters"))]
    pub name: String,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be 1-5000 characters"
    ))]
    pub text: String,

    #[validate(range(
        min = 1,
        max = 4320,
        message = "Cooking time must be between 1 and 4320 minutes"
    ))]
    pub cooking_time: i32,

    #[validate(length(max = 255, message = "Image reference must not exceed 255 characters"))]
    pub image: Option<String>,

    #[serde(default)]
    pub tags: Vec<i64>,

    #[validate(nested)]
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredientDto>,
}

// ============================================================================
// Pagination & Query DTOs
// ============================================================================

/// Highest page a listing accepts.
pub const MAX_PAGE: usize = 100_000;

#[derive(Serialize, Deserialize, Validate, Debug, Default, Clone, Copy)]
pub struct PaginationDto {
    #[validate(range(min = 1, max = MAX_PAGE))]
    pub page: Option<usize>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

impl PaginationDto {
    pub fn new(page: usize, limit: usize) -> Self {
        PaginationDto {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::try_from(self.limit.unwrap_or(10)).unwrap_or(i64::MAX)
    }

    /// Rows to skip; saturates instead of overflowing on unvalidated input.
    pub fn offset(&self) -> i64 {
        let page = i64::try_from(self.page.unwrap_or(1)).unwrap_or(i64::MAX);
        page.saturating_sub(1).saturating_mul(self.limit())
    }
}

/// Recipe list filters; every set field narrows the result.
#[derive(Serialize, Deserialize, Validate, Debug, Default, Clone)]
pub struct RecipeFilterDto {
    pub author: Option<Uuid>,

    /// Tag slugs; a recipe matches when it carries any of them.
    #[serde(default)]
    pub tags: Vec<String>,

    pub favorited_by: Option<Uuid>,

    pub in_cart_of: Option<Uuid>,

    #[validate(nested)]
    #[serde(flatten)]
    pub pagination: PaginationDto,
}
