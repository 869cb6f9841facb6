use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::{
    ingredients::repo::IngredientRepo, recipes::repo::RecipeRepo,
    relations::repo::RelationRepo, shopping_list::repo::ShoppingListRepo,
    users::repo::UserRepo,
};

#[cfg(test)]
pub mod memory;

/// Everything the handlers need from persistence.
pub trait Store: UserRepo + IngredientRepo + RecipeRepo + RelationRepo + ShoppingListRepo {}

impl<T> Store for T where
    T: UserRepo + IngredientRepo + RecipeRepo + RelationRepo + ShoppingListRepo
{
}

/// Postgres-backed store. Each feature module implements its repository
/// trait for this type next to its SQL.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        info!("migrations applied");
        Ok(())
    }
}
