use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::PgStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[async_trait]
pub trait IngredientRepo: Send + Sync {
    /// Ingredients ordered by name, optionally restricted to a
    /// case-insensitive name prefix.
    async fn search_ingredients(&self, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>>;
    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>>;
    /// The subset of `ids` that exist.
    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>>;
}

/// LIKE pattern matching values that start with `prefix` literally.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl IngredientRepo for PgStore {
    async fn search_ingredients(&self, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE $1::text IS NULL OR lower(name) LIKE $1
            ORDER BY name, measurement_unit
            "#,
        )
        .bind(prefix.map(like_prefix))
        .fetch_all(&self.db)
        .await
        .context("search ingredients")?;
        Ok(rows)
    }

    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find ingredient")?;
        Ok(row)
    }

    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        let rows: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db)
            .await
            .context("check ingredient ids")?;
        Ok(rows)
    }
}
