use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{info, instrument};

use super::services::{shopping_report, REPORT_FILENAME};
use crate::{auth::extractors::AuthUser, error::AppResult, state::AppState};

pub fn shopping_list_routes() -> Router<AppState> {
    Router::new().route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<impl IntoResponse> {
    let report = shopping_report(&state, user_id).await?;
    info!(%user_id, bytes = report.len(), "shopping list downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILENAME}\""),
            ),
        ],
        report,
    ))
}
