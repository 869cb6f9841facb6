use axum::{extract::State, routing::get, Router};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::repo::Ingredient;
use crate::{
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(search): Query<IngredientSearch>,
) -> AppResult<Json<Vec<Ingredient>>> {
    let prefix = search.name.as_deref().map(str::trim).filter(|p| !p.is_empty());
    Ok(Json(state.store.search_ingredients(prefix).await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Ingredient>> {
    state
        .store
        .find_ingredient(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Ingredient not found".into()))
}
