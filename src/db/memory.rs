//! In-memory `Store` used by unit tests. Mirrors the uniqueness rules and
//! cascades of the SQL schema.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    ingredients::repo::{Ingredient, IngredientRepo},
    recipes::{
        repo::RecipeRepo,
        repo_types::{NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipeIngredient},
    },
    relations::repo::{RelationKind, RelationRepo},
    shopping_list::repo::{CartIngredient, CartRecipe, ShoppingListRepo},
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    ingredients: Vec<Ingredient>,
    /// Insertion order; listing walks it backwards for newest first.
    recipes: Vec<Recipe>,
    /// (recipe, ingredient, amount)
    lines: Vec<(Uuid, Uuid, i16)>,
    /// (kind, user, target) in creation order.
    relations: Vec<(RelationKind, Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }

    pub fn seed_ingredient(&self, name: &str, unit: &str) -> Ingredient {
        let ingredient = Ingredient {
            id: Uuid::new_v4(),
            name: name.into(),
            measurement_unit: unit.into(),
        };
        self.lock().ingredients.push(ingredient.clone());
        ingredient
    }

    pub fn seed_user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{username}@example.com"),
            username: username.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            password_hash: String::new(),
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.lock().users.push(user.clone());
        user
    }

    pub fn line_count(&self, recipe_id: Uuid) -> usize {
        self.lock().lines.iter().filter(|l| l.0 == recipe_id).count()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|u| u.email == new.email || u.username == new.username)
        {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            password_hash: new.password_hash,
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(Some(user))
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> anyhow::Result<(Vec<User>, i64)> {
        let mut users = self.lock().users.clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        let total = users.len() as i64;
        let page = users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<&str>) -> anyhow::Result<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.avatar = avatar.map(str::to_string);
        }
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[async_trait]
impl IngredientRepo for MemoryStore {
    async fn search_ingredients(&self, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let prefix = prefix.map(str::to_lowercase);
        let mut rows: Vec<Ingredient> = self
            .lock()
            .ingredients
            .iter()
            .filter(|i| match &prefix {
                Some(p) => i.name.to_lowercase().starts_with(p.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.name, &a.measurement_unit).cmp(&(&b.name, &b.measurement_unit))
        });
        Ok(rows)
    }

    async fn find_ingredient(&self, id: Uuid) -> anyhow::Result<Option<Ingredient>> {
        Ok(self.lock().ingredients.iter().find(|i| i.id == id).cloned())
    }

    async fn existing_ingredient_ids(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Uuid>> {
        Ok(self
            .lock()
            .ingredients
            .iter()
            .filter(|i| ids.contains(&i.id))
            .map(|i| i.id)
            .collect())
    }
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn insert_recipe(&self, new: NewRecipe) -> anyhow::Result<Recipe> {
        let mut inner = self.lock();
        let recipe = Recipe {
            id: Uuid::new_v4(),
            author_id: new.author_id,
            name: new.name,
            text: new.text,
            image: new.image,
            cooking_time: new.cooking_time,
            created_at: OffsetDateTime::now_utc(),
        };
        for line in &new.ingredients {
            inner.lines.push((recipe.id, line.ingredient_id, line.amount));
        }
        inner.recipes.push(recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        id: Uuid,
        changes: RecipeChanges,
    ) -> anyhow::Result<Option<Recipe>> {
        let mut inner = self.lock();
        let Some(recipe) = inner.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            recipe.name = name;
        }
        if let Some(text) = changes.text {
            recipe.text = text;
        }
        if let Some(image) = changes.image {
            recipe.image = image;
        }
        if let Some(cooking_time) = changes.cooking_time {
            recipe.cooking_time = cooking_time;
        }
        let updated = recipe.clone();
        inner.lines.retain(|l| l.0 != id);
        for line in &changes.ingredients {
            inner.lines.push((id, line.ingredient_id, line.amount));
        }
        Ok(Some(updated))
    }

    async fn delete_recipe(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.recipes.len();
        inner.recipes.retain(|r| r.id != id);
        if inner.recipes.len() == before {
            return Ok(false);
        }
        inner.lines.retain(|l| l.0 != id);
        inner
            .relations
            .retain(|(kind, _, target)| *kind == RelationKind::Subscription || *target != id);
        Ok(true)
    }

    async fn find_recipe(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        Ok(self.lock().recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn list_recipes(
        &self,
        filter: RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Recipe>, i64)> {
        let inner = self.lock();
        let related = |kind: RelationKind, user: Option<Uuid>, recipe: Uuid| match user {
            Some(user) => inner
                .relations
                .iter()
                .any(|r| *r == (kind, user, recipe)),
            None => true,
        };
        let matching: Vec<Recipe> = inner
            .recipes
            .iter()
            .rev()
            .filter(|r| filter.author.map_or(true, |a| r.author_id == a))
            .filter(|r| related(RelationKind::Favorite, filter.favorited_by, r.id))
            .filter(|r| related(RelationKind::ShoppingCart, filter.in_cart_of, r.id))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn recipe_ingredients(&self, recipe_id: Uuid) -> anyhow::Result<Vec<RecipeIngredient>> {
        let inner = self.lock();
        let mut rows: Vec<RecipeIngredient> = inner
            .lines
            .iter()
            .filter(|l| l.0 == recipe_id)
            .filter_map(|(_, ingredient_id, amount)| {
                inner
                    .ingredients
                    .iter()
                    .find(|i| i.id == *ingredient_id)
                    .map(|i| RecipeIngredient {
                        id: i.id,
                        name: i.name.clone(),
                        measurement_unit: i.measurement_unit.clone(),
                        amount: *amount,
                    })
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn recipes_by_author(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Recipe>> {
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(self
            .lock()
            .recipes
            .iter()
            .rev()
            .filter(|r| r.author_id == author_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_recipes_by_author(&self, author_id: Uuid) -> anyhow::Result<i64> {
        Ok(self
            .lock()
            .recipes
            .iter()
            .filter(|r| r.author_id == author_id)
            .count() as i64)
    }
}

#[async_trait]
impl RelationRepo for MemoryStore {
    async fn add_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let row = (kind, user_id, target_id);
        if inner.relations.contains(&row) {
            return Ok(false);
        }
        inner.relations.push(row);
        Ok(true)
    }

    async fn remove_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        let mut inner = self.lock();
        let before = inner.relations.len();
        inner.relations.retain(|r| *r != (kind, user_id, target_id));
        Ok(inner.relations.len() < before)
    }

    async fn has_relation(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        target_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self.lock().relations.contains(&(kind, user_id, target_id)))
    }

    async fn related_targets(
        &self,
        kind: RelationKind,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Uuid>, i64)> {
        let targets: Vec<Uuid> = self
            .lock()
            .relations
            .iter()
            .filter(|(k, u, _)| *k == kind && *u == user_id)
            .map(|(_, _, target)| *target)
            .collect();
        let total = targets.len() as i64;
        let page = targets
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl ShoppingListRepo for MemoryStore {
    async fn cart_contents(&self, user_id: Uuid) -> anyhow::Result<Vec<CartRecipe>> {
        let inner = self.lock();
        let mut cart = Vec::new();
        for (kind, user, recipe_id) in &inner.relations {
            if *kind != RelationKind::ShoppingCart || *user != user_id {
                continue;
            }
            let Some(recipe) = inner.recipes.iter().find(|r| r.id == *recipe_id) else {
                continue;
            };
            let author_username = inner
                .users
                .iter()
                .find(|u| u.id == recipe.author_id)
                .map(|u| u.username.clone())
                .unwrap_or_default();
            let ingredients = inner
                .lines
                .iter()
                .filter(|l| l.0 == recipe.id)
                .filter_map(|(_, ingredient_id, amount)| {
                    inner
                        .ingredients
                        .iter()
                        .find(|i| i.id == *ingredient_id)
                        .map(|i| CartIngredient {
                            name: i.name.clone(),
                            measurement_unit: i.measurement_unit.clone(),
                            amount: i64::from(*amount),
                        })
                })
                .collect();
            cart.push(CartRecipe {
                name: recipe.name.clone(),
                author_username,
                ingredients,
            });
        }
        Ok(cart)
    }
}
