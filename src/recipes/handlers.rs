use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        CreateRecipeRequest, RecipeListQuery, RecipeResponse, ShortRecipeResponse,
        UpdateRecipeRequest,
    },
    services,
};
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppResult,
    extract::{Json, Path, Query},
    pagination::Page,
    relations::{
        repo::RelationKind,
        services::{create_relation, delete_relation},
    },
    state::AppState,
};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route("/recipes/:id/favorite", post(favorite).delete(unfavorite))
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // base64 images
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<RecipeListQuery>,
) -> AppResult<Json<Page<RecipeResponse>>> {
    Ok(Json(services::list_recipes(&state, viewer, query).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecipeResponse>> {
    Ok(Json(services::get_recipe(&state, viewer, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateRecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeResponse>)> {
    let recipe = services::create_recipe(&state, user_id, payload).await?;
    let body = services::recipe_response(&state, Some(user_id), &recipe).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = services::update_recipe(&state, user_id, id, payload).await?;
    Ok(Json(
        services::recipe_response(&state, Some(user_id), &recipe).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_recipe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_relation(
    state: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    recipe_id: Uuid,
) -> AppResult<(StatusCode, Json<ShortRecipeResponse>)> {
    create_relation(state, kind, user_id, recipe_id).await?;
    let body = services::get_short_recipe(state, recipe_id).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state))]
pub async fn favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ShortRecipeResponse>)> {
    add_relation(&state, RelationKind::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn unfavorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_relation(&state, RelationKind::Favorite, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ShortRecipeResponse>)> {
    add_relation(&state, RelationKind::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_relation(&state, RelationKind::ShoppingCart, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
