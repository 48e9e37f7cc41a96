use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::model::{AuthorSummary, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Returns false when the user no longer exists.
    async fn save(&self, user: &User) -> anyhow::Result<bool>;
    /// Writes both records or neither (follow/unfollow). Returns false, and
    /// writes nothing, when either user no longer exists.
    async fn save_pair(&self, a: &User, b: &User) -> anyhow::Result<bool>;
    async fn summaries(&self, ids: &[Uuid]) -> anyhow::Result<Vec<AuthorSummary>>;
    async fn remove_favorite_everywhere(&self, recipe_id: Uuid) -> anyhow::Result<u64>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, avatar, \
     bio, favorite_recipes, followers, following, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn update_query(user: &User) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        UPDATE users
           SET username = $2, email = $3, password_hash = $4, first_name = $5,
               last_name = $6, avatar = $7, bio = $8, favorite_recipes = $9,
               followers = $10, following = $11
         WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.avatar)
    .bind(&user.bio)
    .bind(&user.favorite_recipes)
    .bind(&user.followers)
    .bind(&user.following)
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name,
                               avatar, bio, favorite_recipes, followers, following, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.avatar)
        .bind(&user.bio)
        .bind(&user.favorite_recipes)
        .bind(&user.followers)
        .bind(&user.following)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .context("insert user")?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<bool> {
        let res = update_query(user)
            .execute(&self.db)
            .await
            .context("update user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn save_pair(&self, a: &User, b: &User) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let first = update_query(a).execute(&mut *tx).await.context("update user")?;
        let second = update_query(b).execute(&mut *tx).await.context("update user")?;
        if first.rows_affected() == 0 || second.rows_affected() == 0 {
            tx.rollback().await.context("rollback tx")?;
            return Ok(false);
        }
        tx.commit().await.context("commit tx")?;
        Ok(true)
    }

    async fn summaries(&self, ids: &[Uuid]) -> anyhow::Result<Vec<AuthorSummary>> {
        let rows = sqlx::query_as::<_, AuthorSummary>(
            r#"
            SELECT id, username, first_name, last_name, avatar
              FROM users
             WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .context("load author summaries")?;
        Ok(rows)
    }

    async fn remove_favorite_everywhere(&self, recipe_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET favorite_recipes = array_remove(favorite_recipes, $1)
             WHERE $1 = ANY(favorite_recipes)
            "#,
        )
        .bind(recipe_id)
        .execute(&self.db)
        .await
        .context("remove favorite references")?;
        Ok(res.rows_affected())
    }
}
