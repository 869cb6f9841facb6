use tracing::{info, warn};
use uuid::Uuid;

use super::repo::RelationKind;
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// Field key every relation error is reported under.
const ERRORS_FIELD: &str = "errors";

fn already_exists(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Subscription => "You are already subscribed to this user.",
        RelationKind::Favorite => "Recipe is already in favorites.",
        RelationKind::ShoppingCart => "Recipe is already in the shopping cart.",
    }
}

fn missing(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Subscription => "You are not subscribed to this user.",
        RelationKind::Favorite => "Recipe is not in favorites.",
        RelationKind::ShoppingCart => "Recipe is not in the shopping cart.",
    }
}

/// Self-subscription is rejected first, then the target must exist.
async fn ensure_target(
    st: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
) -> AppResult<()> {
    match kind {
        RelationKind::Subscription => {
            if user_id == target_id {
                return Err(AppError::field(
                    ERRORS_FIELD,
                    "You cannot subscribe to yourself.",
                ));
            }
            if st.store.find_user_by_id(target_id).await?.is_none() {
                return Err(AppError::NotFound("User not found".into()));
            }
        }
        RelationKind::Favorite | RelationKind::ShoppingCart => {
            if st.store.find_recipe(target_id).await?.is_none() {
                return Err(AppError::NotFound("Recipe not found".into()));
            }
        }
    }
    Ok(())
}

pub async fn create_relation(
    st: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
) -> AppResult<()> {
    ensure_target(st, kind, user_id, target_id).await?;
    if !st.store.add_relation(kind, user_id, target_id).await? {
        warn!(?kind, %user_id, %target_id, "duplicate relation");
        return Err(AppError::field(ERRORS_FIELD, already_exists(kind)));
    }
    info!(?kind, %user_id, %target_id, "relation created");
    Ok(())
}

pub async fn delete_relation(
    st: &AppState,
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
) -> AppResult<()> {
    ensure_target(st, kind, user_id, target_id).await?;
    if !st.store.remove_relation(kind, user_id, target_id).await? {
        warn!(?kind, %user_id, %target_id, "relation to delete not found");
        return Err(AppError::field(ERRORS_FIELD, missing(kind)));
    }
    info!(?kind, %user_id, %target_id, "relation deleted");
    Ok(())
}
