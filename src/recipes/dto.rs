use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::RecipeIngredient;
use crate::users::dto::UserResponse;

/// `{id, amount}` as sent by the client. Range checks happen in validation,
/// so amounts are accepted as wide integers here.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountRequest {
    pub id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

/// PATCH body. Every field but `ingredients` may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<Uuid>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: Uuid,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
}

#[derive(Debug, Serialize)]
pub struct ShortRecipeResponse {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

#[derive(Debug, Serialize)]
pub struct ShortLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}
