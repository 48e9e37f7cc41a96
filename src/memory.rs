use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::recipes::{model::Recipe, query::RecipeFilter, repo::RecipeRepo};
use crate::users::{
    model::{AuthorSummary, User},
    repo::UserRepo,
};

/// Process-local store with the same contract as the Postgres repos.
/// Used when no `DATABASE_URL` is configured and by the test suite.
#[derive(Default)]
pub struct MemoryStore {
    recipes: RwLock<HashMap<Uuid, Recipe>>,
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn insert(&self, recipe: &Recipe) -> anyhow::Result<()> {
        let mut map = self.recipes.write().await;
        anyhow::ensure!(!map.contains_key(&recipe.id), "recipe {} already exists", recipe.id);
        map.insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        Ok(self.recipes.read().await.get(&id).cloned())
    }

    async fn save(&self, recipe: &Recipe) -> anyhow::Result<bool> {
        let mut map = self.recipes.write().await;
        match map.get_mut(&recipe.id) {
            Some(slot) => {
                *slot = recipe.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.recipes.write().await.remove(&id).is_some())
    }

    async fn search(&self, filter: &RecipeFilter) -> anyhow::Result<(Vec<Recipe>, i64)> {
        Ok(filter.apply(self.recipes.read().await.values()))
    }

    async fn count_by_author(&self, author_id: Uuid, public_only: bool) -> anyhow::Result<i64> {
        let n = self
            .recipes
            .read()
            .await
            .values()
            .filter(|r| r.author_id == author_id && (r.is_public || !public_only))
            .count();
        Ok(n as i64)
    }

    async fn top_authors(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>> {
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for r in self.recipes.read().await.values().filter(|r| r.is_public) {
            *counts.entry(r.author_id).or_default() += 1;
        }
        let mut ranked: Vec<(Uuid, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ranked)
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        let mut map = self.users.write().await;
        anyhow::ensure!(
            !map.values()
                .any(|u| u.email == user.email || u.username == user.username),
            "duplicate user"
        );
        map.insert(user.id, user.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let map = self.users.read().await;
        Ok(map.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let map = self.users.read().await;
        Ok(map.values().find(|u| u.username == username).cloned())
    }

    async fn save(&self, user: &User) -> anyhow::Result<bool> {
        let mut map = self.users.write().await;
        match map.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_pair(&self, a: &User, b: &User) -> anyhow::Result<bool> {
        let mut map = self.users.write().await;
        if !(map.contains_key(&a.id) && map.contains_key(&b.id)) {
            return Ok(false);
        }
        for user in [a, b] {
            map.insert(user.id, user.clone());
        }
        Ok(true)
    }

    async fn summaries(&self, ids: &[Uuid]) -> anyhow::Result<Vec<AuthorSummary>> {
        let map = self.users.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id))
            .map(User::summary)
            .collect())
    }

    async fn remove_favorite_everywhere(&self, recipe_id: Uuid) -> anyhow::Result<u64> {
        let mut map = self.users.write().await;
        let mut touched = 0;
        for user in map.values_mut() {
            let before = user.favorite_recipes.len();
            user.favorite_recipes.retain(|id| *id != recipe_id);
            if user.favorite_recipes.len() != before {
                touched += 1;
            }
        }
        Ok(touched)
    }
}
