use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::repo::CartRecipe;
use crate::{error::AppResult, state::AppState};

pub const REPORT_FILENAME: &str = "shopping_list.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedIngredient {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Cart contents folded into what the report prints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    /// Sorted by (name, unit).
    pub ingredients: Vec<ListedIngredient>,
    /// Distinct (recipe name, author username), sorted.
    pub recipes: Vec<(String, String)>,
}

pub fn aggregate(cart: &[CartRecipe]) -> ShoppingList {
    let mut totals: BTreeMap<(&str, &str), i64> = BTreeMap::new();
    let mut recipes: BTreeSet<(&str, &str)> = BTreeSet::new();

    for recipe in cart {
        recipes.insert((recipe.name.as_str(), recipe.author_username.as_str()));
        for line in &recipe.ingredients {
            *totals
                .entry((line.name.as_str(), line.measurement_unit.as_str()))
                .or_insert(0) += line.amount;
        }
    }

    ShoppingList {
        ingredients: totals
            .into_iter()
            .map(|((name, unit), total)| ListedIngredient {
                name: name.to_string(),
                measurement_unit: unit.to_string(),
                total,
            })
            .collect(),
        recipes: recipes
            .into_iter()
            .map(|(name, author)| (name.to_string(), author.to_string()))
            .collect(),
    }
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn render_report(list: &ShoppingList, date: Date) -> anyhow::Result<String> {
    let date = date
        .format(format_description!("[day].[month].[year]"))
        .context("format report date")?;

    let mut lines = vec![format!("Список покупок от {date}:"), "Ингредиенты:".to_string()];
    for (n, item) in list.ingredients.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}) - {}",
            n + 1,
            capitalize(&item.name),
            item.measurement_unit,
            item.total
        ));
    }
    lines.push(String::new());
    lines.push("Рецепты:".to_string());
    for (n, (name, author)) in list.recipes.iter().enumerate() {
        lines.push(format!("{}. {} (от: {})", n + 1, name, author));
    }
    Ok(lines.join("\n"))
}

/// Today's shopping list for `user_id` as plain text.
pub async fn shopping_report(st: &AppState, user_id: Uuid) -> AppResult<String> {
    let cart = st.store.cart_contents(user_id).await?;
    let list = aggregate(&cart);
    debug!(
        %user_id,
        recipes = list.recipes.len(),
        ingredients = list.ingredients.len(),
        "shopping list aggregated"
    );
    Ok(render_report(&list, OffsetDateTime::now_utc().date())?)
}
