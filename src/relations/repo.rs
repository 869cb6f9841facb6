use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::db::PgStore;

/// The three user→target pair tables. All share the same shape:
/// `(user_id, <target>, created_at)` with the pair as primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// user → author
    Subscription,
    /// user → recipe
    Favorite,
    /// user → recipe
    ShoppingCart,
}

impl RelationKind {
    fn table(self) -> &'static str {
        match self {
            RelationKind::Subscription => "subscriptions",
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            RelationKind::Subscription => "author_id",
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
        }
    }
}

#[async_trait]
pub trait RelationRepo: Send + Sync {
    /// `false` when the pair already existed.
    async fn add_relation(&self, kind: RelationKind, user_id: Uuid, target_id: Uuid)
        -> anyhow::Result<bool>;
    /// `false` when there was nothing to remove.
    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool>;
    async fn has_relation(&self, kind: RelationKind, user_id: Uuid, target_id: Uuid)
        -> anyhow::Result<bool>;
    /// Targets of `user_id` in creation order, plus the total count.
    async fn related_targets(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Uuid>, i64)>;
}

#[async_trait]
impl RelationRepo for PgStore {
    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.table(),
            kind.target_column()
        );
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&self.db)
            .await
            .with_context(|| format!("insert into {}", kind.table()))?;
        Ok(res.rows_affected() == 1)
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            kind.table(),
            kind.target_column()
        );
        let res = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete from {}", kind.table()))?;
        Ok(res.rows_affected() > 0)
    }

    async fn has_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2)",
            kind.table(),
            kind.target_column()
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(target_id)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("probe {}", kind.table()))?;
        Ok(exists)
    }

    async fn related_targets(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Uuid>, i64)> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
            kind.target_column(),
            kind.table()
        );
        let targets: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("list {}", kind.table()))?;

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE user_id = $1", kind.table());
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .with_context(|| format!("count {}", kind.table()))?;
        Ok((targets, total))
    }
}
