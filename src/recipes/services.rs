use std::collections::HashSet;

use anyhow::anyhow;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreateRecipeRequest, IngredientAmountRequest, RecipeListQuery, RecipeResponse,
        ShortRecipeResponse, UpdateRecipeRequest,
    },
    repo_types::{IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeFilter},
};
use crate::{
    error::{AppError, AppResult, FieldErrors},
    images::services::{discard_image, image_url, store_image},
    pagination::{Page, PageQuery},
    relations::repo::RelationKind,
    state::AppState,
    users::services::user_response,
};

const NAME_MAX_LEN: usize = 256;
const MIN_VALUE: i64 = 1;
const MAX_VALUE: i64 = 32_000;
const IMAGE_FOLDER: &str = "recipes/images";

const REQUIRED: &str = "This field is required.";

fn in_range(value: i64) -> Option<i16> {
    if (MIN_VALUE..=MAX_VALUE).contains(&value) {
        i16::try_from(value).ok()
    } else {
        None
    }
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "This field may not be blank.");
    } else if name.chars().count() > NAME_MAX_LEN {
        errors.add(
            "name",
            format!("Ensure this field has no more than {NAME_MAX_LEN} characters."),
        );
    }
}

fn check_text(errors: &mut FieldErrors, text: &str) {
    if text.trim().is_empty() {
        errors.add("text", "This field may not be blank.");
    }
}

fn check_cooking_time(errors: &mut FieldErrors, minutes: i64) -> Option<i16> {
    let checked = in_range(minutes);
    if checked.is_none() {
        errors.add(
            "cooking_time",
            format!("Cooking time must be between {MIN_VALUE} and {MAX_VALUE} minutes."),
        );
    }
    checked
}

/// Shape checks on the ingredient list. Existence is checked separately
/// against the catalogue.
fn check_ingredients(
    errors: &mut FieldErrors,
    ingredients: Option<&[IngredientAmountRequest]>,
) -> Vec<IngredientAmount> {
    let Some(ingredients) = ingredients else {
        errors.add("ingredients", REQUIRED);
        return Vec::new();
    };
    if ingredients.is_empty() {
        errors.add("ingredients", "At least one ingredient is required.");
        return Vec::new();
    }

    let mut seen = HashSet::with_capacity(ingredients.len());
    let mut lines = Vec::with_capacity(ingredients.len());
    let mut ok = true;
    for item in ingredients {
        if !seen.insert(item.id) {
            errors.add("ingredients", format!("Ingredient {} is listed twice.", item.id));
            ok = false;
        }
        match in_range(item.amount) {
            Some(amount) => lines.push(IngredientAmount {
                ingredient_id: item.id,
                amount,
            }),
            None => {
                errors.add(
                    "ingredients",
                    format!("Amount must be between {MIN_VALUE} and {MAX_VALUE}."),
                );
                ok = false;
            }
        }
    }
    if ok {
        lines
    } else {
        Vec::new()
    }
}

async fn check_ingredients_exist(
    st: &AppState,
    errors: &mut FieldErrors,
    lines: &[IngredientAmount],
) -> AppResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = lines.iter().map(|l| l.ingredient_id).collect();
    let existing: HashSet<Uuid> = st
        .store
        .existing_ingredient_ids(&ids)
        .await?
        .into_iter()
        .collect();
    for id in ids.iter().filter(|id| !existing.contains(*id)) {
        errors.add("ingredients", format!("Ingredient {id} does not exist."));
    }
    Ok(())
}

fn ensure_author(recipe: &Recipe, user_id: Uuid) -> AppResult<()> {
    if recipe.author_id != user_id {
        warn!(recipe_id = %recipe.id, %user_id, "non-author tried to modify recipe");
        return Err(AppError::PermissionDenied(
            "You do not have permission to perform this action.".into(),
        ));
    }
    Ok(())
}

async fn find_recipe(st: &AppState, id: Uuid) -> AppResult<Recipe> {
    st.store
        .find_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".into()))
}

pub async fn create_recipe(
    st: &AppState,
    author_id: Uuid,
    req: CreateRecipeRequest,
) -> AppResult<Recipe> {
    let mut errors = FieldErrors::new();

    let name = req.name.unwrap_or_default();
    check_name(&mut errors, &name);
    let text = req.text.unwrap_or_default();
    check_text(&mut errors, &text);
    let cooking_time = match req.cooking_time {
        Some(minutes) => check_cooking_time(&mut errors, minutes),
        None => {
            errors.add("cooking_time", REQUIRED);
            None
        }
    };
    let image = req.image.filter(|i| !i.trim().is_empty());
    if image.is_none() {
        errors.add("image", REQUIRED);
    }
    let lines = check_ingredients(&mut errors, req.ingredients.as_deref());
    check_ingredients_exist(st, &mut errors, &lines).await?;
    errors.into_result()?;

    let (Some(image), Some(cooking_time)) = (image, cooking_time) else {
        return Err(anyhow!("validated recipe is missing image or cooking time").into());
    };
    let key = store_image(st, IMAGE_FOLDER, "image", &image).await?;

    let new = NewRecipe {
        author_id,
        name: name.trim().to_string(),
        text,
        image: key.clone(),
        cooking_time,
        ingredients: lines,
    };
    match st.store.insert_recipe(new).await {
        Ok(recipe) => {
            info!(recipe_id = %recipe.id, %author_id, "recipe created");
            Ok(recipe)
        }
        Err(e) => {
            discard_image(st, &key).await;
            Err(e.into())
        }
    }
}

/// Author-only partial update. The ingredient set is always replaced.
pub async fn update_recipe(
    st: &AppState,
    user_id: Uuid,
    id: Uuid,
    req: UpdateRecipeRequest,
) -> AppResult<Recipe> {
    let recipe = find_recipe(st, id).await?;
    ensure_author(&recipe, user_id)?;

    let mut errors = FieldErrors::new();
    if let Some(name) = &req.name {
        check_name(&mut errors, name);
    }
    if let Some(text) = &req.text {
        check_text(&mut errors, text);
    }
    let cooking_time = req
        .cooking_time
        .and_then(|minutes| check_cooking_time(&mut errors, minutes));
    let image = req.image.filter(|i| !i.trim().is_empty());
    let lines = check_ingredients(&mut errors, req.ingredients.as_deref());
    check_ingredients_exist(st, &mut errors, &lines).await?;
    errors.into_result()?;

    let new_key = match &image {
        Some(data) => Some(store_image(st, IMAGE_FOLDER, "image", data).await?),
        None => None,
    };
    let changes = RecipeChanges {
        name: req.name.map(|n| n.trim().to_string()),
        text: req.text,
        image: new_key.clone(),
        cooking_time,
        ingredients: lines,
    };

    let updated = match st.store.update_recipe(id, changes).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            if let Some(key) = &new_key {
                discard_image(st, key).await;
            }
            return Err(AppError::NotFound("Recipe not found".into()));
        }
        Err(e) => {
            if let Some(key) = &new_key {
                discard_image(st, key).await;
            }
            return Err(e.into());
        }
    };
    if new_key.is_some() {
        discard_image(st, &recipe.image).await;
    }
    info!(recipe_id = %id, %user_id, "recipe updated");
    Ok(updated)
}

pub async fn delete_recipe(st: &AppState, user_id: Uuid, id: Uuid) -> AppResult<()> {
    let recipe = find_recipe(st, id).await?;
    ensure_author(&recipe, user_id)?;
    if !st.store.delete_recipe(id).await? {
        return Err(AppError::NotFound("Recipe not found".into()));
    }
    discard_image(st, &recipe.image).await;
    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(())
}

pub async fn get_recipe(st: &AppState, viewer: Option<Uuid>, id: Uuid) -> AppResult<RecipeResponse> {
    let recipe = find_recipe(st, id).await?;
    recipe_response(st, viewer, &recipe).await
}

/// Short view of an existing recipe, for favorite and cart responses.
pub async fn get_short_recipe(st: &AppState, id: Uuid) -> AppResult<ShortRecipeResponse> {
    let recipe = find_recipe(st, id).await?;
    short_recipe_response(st, &recipe).await
}

fn flag_set(flag: Option<&str>) -> bool {
    matches!(flag, Some("1") | Some("true"))
}

/// Relation filters only apply for an authenticated viewer.
fn list_filter(viewer: Option<Uuid>, query: &RecipeListQuery) -> RecipeFilter {
    let mut filter = RecipeFilter {
        author: query.author,
        ..RecipeFilter::default()
    };
    if let Some(viewer) = viewer {
        if flag_set(query.is_favorited.as_deref()) {
            filter.favorited_by = Some(viewer);
        }
        if flag_set(query.is_in_shopping_cart.as_deref()) {
            filter.in_cart_of = Some(viewer);
        }
    }
    filter
}

pub async fn list_recipes(
    st: &AppState,
    viewer: Option<Uuid>,
    query: RecipeListQuery,
) -> AppResult<Page<RecipeResponse>> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let (limit, offset) = page.window(st.config.page_size);
    let filter = list_filter(viewer, &query);
    let (recipes, count) = st.store.list_recipes(filter, limit, offset).await?;
    let mut results = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        results.push(recipe_response(st, viewer, recipe).await?);
    }
    Ok(Page { count, results })
}

pub async fn recipe_response(
    st: &AppState,
    viewer: Option<Uuid>,
    recipe: &Recipe,
) -> AppResult<RecipeResponse> {
    let author = st
        .store
        .find_user_by_id(recipe.author_id)
        .await?
        .ok_or_else(|| anyhow!("author {} of recipe {} is missing", recipe.author_id, recipe.id))?;
    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            st.store
                .has_relation(RelationKind::Favorite, viewer, recipe.id)
                .await?,
            st.store
                .has_relation(RelationKind::ShoppingCart, viewer, recipe.id)
                .await?,
        ),
        None => (false, false),
    };
    Ok(RecipeResponse {
        id: recipe.id,
        author: user_response(st, viewer, &author).await?,
        ingredients: st.store.recipe_ingredients(recipe.id).await?,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name.clone(),
        image: image_url(st, &recipe.image).await?,
        text: recipe.text.clone(),
        cooking_time: recipe.cooking_time,
    })
}

pub async fn short_recipe_response(st: &AppState, recipe: &Recipe) -> AppResult<ShortRecipeResponse> {
    Ok(ShortRecipeResponse {
        id: recipe.id,
        name: recipe.name.clone(),
        image: image_url(st, &recipe.image).await?,
        cooking_time: recipe.cooking_time,
    })
}
