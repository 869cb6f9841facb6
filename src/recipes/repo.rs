use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{
    IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipeIngredient,
};
use crate::db::PgStore;

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Store a recipe together with its ingredient lines, atomically.
    async fn insert_recipe(&self, new: NewRecipe) -> anyhow::Result<Recipe>;
    /// Apply `changes` and replace the ingredient lines, atomically.
    /// `None` when the recipe does not exist.
    async fn update_recipe(&self, id: Uuid, changes: RecipeChanges)
        -> anyhow::Result<Option<Recipe>>;
    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    /// Newest first, plus the total count matching `filter`.
    async fn list_recipes(
        &self,
        filter: RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Recipe>, i64)>;
    async fn recipe_ingredients(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>>;
    /// Newest first; `limit = None` returns all of them.
    async fn recipes_by_author(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Recipe>>;
    async fn count_recipes_by_author(&self, author_id: Uuid) -> anyhow::Result<i64>;
}

async fn insert_lines_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    lines: &[IngredientAmount],
) -> anyhow::Result<()> {
    let ingredient_ids: Vec<Uuid> = lines.iter().map(|l| l.ingredient_id).collect();
    let amounts: Vec<i16> = lines.iter().map(|l| l.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, t.ingredient_id, t.amount
        FROM UNNEST($2::uuid[], $3::int2[]) AS t(ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(ingredient_ids)
    .bind(amounts)
    .execute(&mut **tx)
    .await
    .context("insert recipe ingredients")?;
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgStore {
    async fn insert_recipe(&self, new: NewRecipe) -> anyhow::Result<Recipe> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (id, author_id, name, text, image, cooking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, author_id, name, text, image, cooking_time, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.author_id)
        .bind(&new.name)
        .bind(&new.text)
        .bind(&new.image)
        .bind(new.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        insert_lines_tx(&mut tx, recipe.id, &new.ingredients).await?;
        tx.commit().await.context("commit tx")?;
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
               SET name = COALESCE($2, name),
                   text = COALESCE($3, text),
                   image = COALESCE($4, image),
                   cooking_time = COALESCE($5, cooking_time)
             WHERE id = $1
            RETURNING id, author_id, name, text, image, cooking_time, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.text.as_deref())
        .bind(changes.image.as_deref())
        .bind(changes.cooking_time)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?;

        let Some(recipe) = recipe else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("clear recipe ingredients")?;
        insert_lines_tx(&mut tx, id, &changes.ingredients).await?;
        tx.commit().await.context("commit tx")?;
        Ok(Some(recipe))
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, author_id, name, text, image, cooking_time, created_at
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe")?;
        Ok(recipe)
    }

    async fn list_recipes(
        &self,
        filter: RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Recipe>, i64)> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR r.author_id = $1)
              AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $2))
              AND ($3::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = $3))
        "#;

        let list_sql = format!(
            "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.created_at \
             FROM recipes r {WHERE} ORDER BY r.created_at DESC LIMIT $4 OFFSET $5"
        );
        let recipes = sqlx::query_as::<_, Recipe>(&list_sql)
            .bind(filter.author)
            .bind(filter.favorited_by)
            .bind(filter.in_cart_of)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list recipes")?;

        let count_sql = format!("SELECT COUNT(*) FROM recipes r {WHERE}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.author)
            .bind(filter.favorited_by)
            .bind(filter.in_cart_of)
            .fetch_one(&self.db)
            .await
            .context("count recipes")?;
        Ok((recipes, total))
    }

    async fn recipe_ingredients(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>> {
        let rows = sqlx::query_as::<_, RecipeIngredient>(
            r#"
            SELECT i.id, i.name, i.measurement_unit, ri.amount
              FROM recipe_ingredients ri
              JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE ri.recipe_id = $1
             ORDER BY i.name
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await
        .context("list recipe ingredients")?;
        Ok(rows)
    }

    async fn recipes_by_author(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, author_id, name, text, image, cooking_time, created_at
              FROM recipes
             WHERE author_id = $1
             ORDER BY created_at DESC
             LIMIT $2
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list recipes by author")?;
        Ok(rows)
    }

    async fn count_recipes_by_author(&self, author_id: Uuid) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.db)
            .await
            .context("count recipes by author")?;
        Ok(total)
    }
}
