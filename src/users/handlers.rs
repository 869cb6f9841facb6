use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        AvatarRequest, AvatarResponse, CreatedUserResponse, RecipesLimitQuery, RegisterRequest,
        SetPasswordRequest, UserResponse, UserWithRecipesResponse,
    },
    services,
};
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppResult,
    extract::{Json, Path, Query},
    pagination::{Page, PageQuery},
    relations::{
        repo::RelationKind,
        services::{create_relation, delete_relation},
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/me", get(me))
        .route("/users/set_password", post(set_password))
        .route("/users/subscriptions", get(subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
        .merge(avatar_routes())
}

fn avatar_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me/avatar", put(put_avatar).delete(delete_avatar))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<CreatedUserResponse>)> {
    let user = services::register_user(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<UserResponse>>> {
    Ok(Json(services::list_users(&state, viewer, page).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let user = services::get_user(&state, id).await?;
    Ok(Json(services::user_response(&state, viewer, &user).await?))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(services::user_response(&state, Some(user_id), &user).await?))
}

#[instrument(skip(state, payload))]
pub async fn put_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AvatarRequest>,
) -> AppResult<Json<AvatarResponse>> {
    let avatar = services::set_avatar(&state, user_id, payload.avatar).await?;
    Ok(Json(AvatarResponse { avatar }))
}

#[instrument(skip(state))]
pub async fn delete_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<StatusCode> {
    services::delete_avatar(&state, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    services::change_password(&state, user_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(page): Query<PageQuery>,
    Query(limit): Query<RecipesLimitQuery>,
) -> AppResult<Json<Page<UserWithRecipesResponse>>> {
    let page = services::subscriptions(&state, user_id, page, limit.recipes_limit).await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
    Query(limit): Query<RecipesLimitQuery>,
) -> AppResult<(StatusCode, Json<UserWithRecipesResponse>)> {
    create_relation(&state, RelationKind::Subscription, user_id, author_id).await?;
    let author = services::get_user(&state, author_id).await?;
    let body =
        services::user_with_recipes(&state, Some(user_id), &author, limit.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    delete_relation(&state, RelationKind::Subscription, user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
