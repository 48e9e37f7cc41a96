use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::memory::MemoryStore;
use crate::recipes::repo::{PgRecipeRepo, RecipeRepo};
use crate::storage::{MemoryStorage, S3Storage, StorageClient};
use crate::users::repo::{PgUserRepo, UserRepo};

/// Everything a handler needs, built once in `main` and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub recipes: Arc<dyn RecipeRepo>,
    pub users: Arc<dyn UserRepo>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (recipes, users): (Arc<dyn RecipeRepo>, Arc<dyn UserRepo>) =
            match &config.database_url {
                Some(url) => {
                    let db = PgPoolOptions::new()
                        .max_connections(10)
                        .connect(url)
                        .await
                        .context("connect to database")?;

                    sqlx::migrate!("./migrations")
                        .run(&db)
                        .await
                        .context("run database migrations")?;

                    info!("using postgres store");
                    (
                        Arc::new(PgRecipeRepo::new(db.clone())) as Arc<dyn RecipeRepo>,
                        Arc::new(PgUserRepo::new(db)) as Arc<dyn UserRepo>,
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; data lives in memory and is lost on restart");
                    let store = Arc::new(MemoryStore::new());
                    (
                        store.clone() as Arc<dyn RecipeRepo>,
                        store as Arc<dyn UserRepo>,
                    )
                }
            };

        let storage: Arc<dyn StorageClient> = match &config.storage {
            Some(cfg) => Arc::new(S3Storage::from_config(cfg).await?) as Arc<dyn StorageClient>,
            None => {
                warn!("MINIO_ENDPOINT not set; images are kept in memory");
                Arc::new(MemoryStorage::new()) as Arc<dyn StorageClient>
            }
        };

        Ok(Self::from_parts(config, recipes, users, storage))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        recipes: Arc<dyn RecipeRepo>,
        users: Arc<dyn UserRepo>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            recipes,
            users,
            storage,
        }
    }

    /// In-memory state with fixed JWT settings, for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            store.clone(),
            store,
            Arc::new(MemoryStorage::new()),
        )
    }
}
