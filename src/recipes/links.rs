use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::dto::ShortLinkResponse;
use crate::{
    error::{AppError, AppResult},
    extract::{Json, Path},
    state::AppState,
};

/// 22-character URL-safe code for a recipe id.
pub fn encode_code(id: Uuid) -> String {
    Base64UrlUnpadded::encode_string(id.as_bytes())
}

pub fn decode_code(code: &str) -> Option<Uuid> {
    let bytes = Base64UrlUnpadded::decode_vec(code).ok()?;
    Uuid::from_slice(&bytes).ok()
}

/// `/recipes/:id/get-link`, mounted under the API prefix.
pub fn link_routes() -> Router<AppState> {
    Router::new().route("/recipes/:id/get-link", get(get_link))
}

/// `/s/:code`, mounted at the site root.
pub fn redirect_routes() -> Router<AppState> {
    Router::new().route("/s/:code", get(follow_link))
}

#[instrument(skip(state))]
pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ShortLinkResponse>> {
    if state.store.find_recipe(id).await?.is_none() {
        return Err(AppError::NotFound("Recipe not found".into()));
    }
    let base = state.config.public_url.trim_end_matches('/');
    Ok(Json(ShortLinkResponse {
        short_link: format!("{}/s/{}", base, encode_code(id)),
    }))
}

#[instrument(skip(state))]
pub async fn follow_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || AppError::NotFound("Short link not found".into());
    let id = decode_code(&code).ok_or_else(not_found)?;
    if state.store.find_recipe(id).await?.is_none() {
        return Err(not_found());
    }
    debug!(%id, "short link followed");
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, format!("/recipes/{id}"))],
    ))
}
