use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{RegisterRequest, SetPasswordRequest, UserResponse, UserWithRecipesResponse},
    hooks::run_user_created,
    repo_types::{NewUser, User},
};
use crate::{
    auth::password::{hash_password, password_problems, verify_password},
    error::{AppError, AppResult, FieldErrors},
    images::services::{discard_image, image_url, store_image},
    pagination::{Page, PageQuery},
    recipes::services::short_recipe_response,
    relations::repo::RelationKind,
    state::AppState,
};

const EMAIL_MAX_LEN: usize = 254;
const NAME_MAX_LEN: usize = 150;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn check_name(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > NAME_MAX_LEN {
        errors.add(field, format!("Ensure this field has no more than {NAME_MAX_LEN} characters."));
    }
}

fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if req.email.is_empty() {
        errors.add("email", "This field is required.");
    } else if req.email.len() > EMAIL_MAX_LEN || !is_valid_email(&req.email) {
        errors.add("email", "Enter a valid email address.");
    }

    check_name(&mut errors, "username", &req.username);
    if !req.username.is_empty() && !is_valid_username(&req.username) {
        errors.add(
            "username",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        );
    }
    // would shadow /users/me
    if req.username == "me" {
        errors.add("username", "This username is reserved.");
    }

    check_name(&mut errors, "first_name", &req.first_name);
    check_name(&mut errors, "last_name", &req.last_name);

    for problem in password_problems(&req.password) {
        errors.add("password", problem);
    }

    errors.into_result()
}

/// Report which unique fields are already taken.
async fn taken_fields(st: &AppState, email: &str, username: &str) -> AppResult<FieldErrors> {
    let mut errors = FieldErrors::new();
    if st.store.find_user_by_email(email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }
    if st.store.find_user_by_username(username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }
    Ok(errors)
}

pub async fn register_user(st: &AppState, mut req: RegisterRequest) -> AppResult<User> {
    req.email = req.email.trim().to_lowercase();
    validate_registration(&req)?;
    taken_fields(st, &req.email, &req.username).await?.into_result()?;

    let new = NewUser {
        email: req.email.clone(),
        username: req.username.clone(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        password_hash: hash_password(&req.password)?,
    };

    let Some(user) = st.store.insert_user(new).await? else {
        // lost a race against a concurrent registration
        warn!(email = %req.email, username = %req.username, "registration conflict");
        let errors = taken_fields(st, &req.email, &req.username).await?;
        return Err(if errors.is_empty() {
            AppError::field("email", "A user with that email already exists.")
        } else {
            AppError::Validation(errors)
        });
    };

    run_user_created(&st.user_hooks, &user);
    Ok(user)
}

pub async fn get_user(st: &AppState, id: Uuid) -> AppResult<User> {
    st.store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// The user behind a valid token; a deleted account reads as unauthenticated.
pub async fn current_user(st: &AppState, id: Uuid) -> AppResult<User> {
    st.store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("User not found".into()))
}

pub async fn user_response(
    st: &AppState,
    viewer: Option<Uuid>,
    user: &User,
) -> AppResult<UserResponse> {
    let is_subscribed = match viewer {
        Some(viewer) => {
            st.store
                .has_relation(RelationKind::Subscription, viewer, user.id)
                .await?
        }
        None => false,
    };
    let avatar = match &user.avatar {
        Some(key) => Some(image_url(st, key).await?),
        None => None,
    };
    Ok(UserResponse {
        email: user.email.clone(),
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        is_subscribed,
        avatar,
    })
}

pub async fn user_with_recipes(
    st: &AppState,
    viewer: Option<Uuid>,
    user: &User,
    recipes_limit: Option<i64>,
) -> AppResult<UserWithRecipesResponse> {
    let base = user_response(st, viewer, user).await?;
    let limit = recipes_limit.filter(|l| *l >= 0);
    let mut recipes = Vec::new();
    for recipe in st.store.recipes_by_author(user.id, limit).await? {
        recipes.push(short_recipe_response(st, &recipe).await?);
    }
    let recipes_count = st.store.count_recipes_by_author(user.id).await?;
    Ok(UserWithRecipesResponse {
        email: base.email,
        id: base.id,
        username: base.username,
        first_name: base.first_name,
        last_name: base.last_name,
        is_subscribed: base.is_subscribed,
        avatar: base.avatar,
        recipes,
        recipes_count,
    })
}

pub async fn list_users(
    st: &AppState,
    viewer: Option<Uuid>,
    page: PageQuery,
) -> AppResult<Page<UserResponse>> {
    let (limit, offset) = page.window(st.config.page_size);
    let (users, count) = st.store.list_users(limit, offset).await?;
    let mut results = Vec::with_capacity(users.len());
    for user in &users {
        results.push(user_response(st, viewer, user).await?);
    }
    Ok(Page { count, results })
}

/// Authors `user_id` follows, as author cards.
pub async fn subscriptions(
    st: &AppState,
    user_id: Uuid,
    page: PageQuery,
    recipes_limit: Option<i64>,
) -> AppResult<Page<UserWithRecipesResponse>> {
    let (limit, offset) = page.window(st.config.page_size);
    let (author_ids, count) = st
        .store
        .related_targets(RelationKind::Subscription, user_id, limit, offset)
        .await?;
    let mut results = Vec::with_capacity(author_ids.len());
    for author_id in author_ids {
        if let Some(author) = st.store.find_user_by_id(author_id).await? {
            results.push(user_with_recipes(st, Some(user_id), &author, recipes_limit).await?);
        }
    }
    Ok(Page { count, results })
}

/// Replace the avatar; returns the new image URL.
pub async fn set_avatar(st: &AppState, user_id: Uuid, avatar: Option<String>) -> AppResult<String> {
    let Some(data) = avatar.filter(|a| !a.trim().is_empty()) else {
        return Err(AppError::field("avatar", "This field is required."));
    };
    let user = current_user(st, user_id).await?;
    let key = store_image(st, &format!("avatars/{user_id}"), "avatar", &data).await?;
    st.store.set_avatar(user_id, Some(&key)).await?;
    if let Some(old) = user.avatar {
        discard_image(st, &old).await;
    }
    info!(%user_id, "avatar updated");
    image_url(st, &key).await
}

pub async fn delete_avatar(st: &AppState, user_id: Uuid) -> AppResult<()> {
    let user = current_user(st, user_id).await?;
    if let Some(old) = user.avatar {
        st.store.set_avatar(user_id, None).await?;
        discard_image(st, &old).await;
        info!(%user_id, "avatar removed");
    }
    Ok(())
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: SetPasswordRequest,
) -> AppResult<()> {
    let user = current_user(st, user_id).await?;
    let mut errors = FieldErrors::new();
    if !verify_password(&req.current_password, &user.password_hash).unwrap_or(false) {
        errors.add("current_password", "Invalid password.");
    }
    for problem in password_problems(&req.new_password) {
        errors.add("new_password", problem);
    }
    errors.into_result()?;

    st.store
        .set_password_hash(user_id, &hash_password(&req.new_password)?)
        .await?;
    info!(%user_id, "password changed");
    Ok(())
}
