use anyhow::Context;
use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::PgStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartIngredient {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// A recipe in someone's cart with everything the report needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecipe {
    pub name: String,
    pub author_username: String,
    pub ingredients: Vec<CartIngredient>,
}

#[async_trait]
pub trait ShoppingListRepo: Send + Sync {
    async fn cart_contents(&self, user_id: Uuid) -> anyhow::Result<Vec<CartRecipe>>;
}

#[derive(Debug, FromRow)]
struct CartRow {
    recipe_id: Uuid,
    recipe_name: String,
    author_username: String,
    ingredient_name: Option<String>,
    measurement_unit: Option<String>,
    amount: Option<i16>,
}

fn group_rows(rows: Vec<CartRow>) -> Vec<CartRecipe> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut recipes: std::collections::HashMap<Uuid, CartRecipe> =
        std::collections::HashMap::new();
    for row in rows {
        let recipe = recipes.entry(row.recipe_id).or_insert_with(|| {
            order.push(row.recipe_id);
            CartRecipe {
                name: row.recipe_name.clone(),
                author_username: row.author_username.clone(),
                ingredients: Vec::new(),
            }
        });
        if let (Some(name), Some(unit), Some(amount)) =
            (row.ingredient_name, row.measurement_unit, row.amount)
        {
            recipe.ingredients.push(CartIngredient {
                name,
                measurement_unit: unit,
                amount: i64::from(amount),
            });
        }
    }
    order
        .into_iter()
        .filter_map(|id| recipes.remove(&id))
        .collect()
}

#[async_trait]
impl ShoppingListRepo for PgStore {
    async fn cart_contents(&self, user_id: Uuid) -> anyhow::Result<Vec<CartRecipe>> {
        let rows = sqlx::query_as::<_, CartRow>(
            r#"
            SELECT r.id AS recipe_id,
                   r.name AS recipe_name,
                   u.username AS author_username,
                   i.name AS ingredient_name,
                   i.measurement_unit,
                   ri.amount
              FROM shopping_cart c
              JOIN recipes r ON r.id = c.recipe_id
              JOIN users u ON u.id = r.author_id
              LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
              LEFT JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE c.user_id = $1
             ORDER BY c.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("load shopping cart")?;
        Ok(group_rows(rows))
    }
}
