use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::recipes::{
    model::Recipe,
    query::RecipeFilter,
    repo_types::{RecipeRow, RECIPE_COLUMNS},
};

/// The recipe collection. Every write stores the whole document.
#[async_trait]
pub trait RecipeRepo: Send + Sync {
    async fn insert(&self, recipe: &Recipe) -> anyhow::Result<()>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    /// Returns false when the recipe no longer exists.
    async fn save(&self, recipe: &Recipe) -> anyhow::Result<bool>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// One page of matches plus the total match count.
    async fn search(&self, filter: &RecipeFilter) -> anyhow::Result<(Vec<Recipe>, i64)>;
    async fn count_by_author(&self, author_id: Uuid, public_only: bool) -> anyhow::Result<i64>;
    /// Authors with the most public recipes, most first, ties by id.
    async fn top_authors(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>>;
}

#[derive(Clone)]
pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_recipes(rows: Vec<RecipeRow>) -> anyhow::Result<Vec<Recipe>> {
    rows.into_iter()
        .map(|row| {
            let id = row.id;
            Recipe::try_from(row).map_err(|e| anyhow::anyhow!("corrupt recipe {id}: {e}"))
        })
        .collect()
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn insert(&self, r: &Recipe) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recipes (id, author_id, title, description, image, prep_time, cook_time,
                                 servings, difficulty, cuisine, category, ingredients,
                                 instructions, tags, reviews, likes, is_public, is_featured,
                                 average_rating, total_reviews, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(r.id)
        .bind(r.author_id)
        .bind(&r.title)
        .bind(&r.description)
        .bind(&r.image)
        .bind(r.prep_time)
        .bind(r.cook_time)
        .bind(r.servings)
        .bind(r.difficulty.as_str())
        .bind(&r.cuisine)
        .bind(r.category.as_str())
        .bind(Json(&r.ingredients))
        .bind(Json(&r.instructions))
        .bind(&r.tags)
        .bind(Json(&r.reviews))
        .bind(&r.likes)
        .bind(r.is_public)
        .bind(r.is_featured)
        .bind(r.average_rating())
        .bind(r.total_reviews())
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.db)
        .await
        .context("insert recipe")?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe")?;
        Ok(into_recipes(row.into_iter().collect())?.pop())
    }

    async fn save(&self, r: &Recipe) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE recipes
               SET title = $2, description = $3, image = $4, prep_time = $5, cook_time = $6,
                   servings = $7, difficulty = $8, cuisine = $9, category = $10,
                   ingredients = $11, instructions = $12, tags = $13, reviews = $14,
                   likes = $15, is_public = $16, is_featured = $17, average_rating = $18,
                   total_reviews = $19, updated_at = $20
             WHERE id = $1
            "#,
        )
        .bind(r.id)
        .bind(&r.title)
        .bind(&r.description)
        .bind(&r.image)
        .bind(r.prep_time)
        .bind(r.cook_time)
        .bind(r.servings)
        .bind(r.difficulty.as_str())
        .bind(&r.cuisine)
        .bind(r.category.as_str())
        .bind(Json(&r.ingredients))
        .bind(Json(&r.instructions))
        .bind(&r.tags)
        .bind(Json(&r.reviews))
        .bind(&r.likes)
        .bind(r.is_public)
        .bind(r.is_featured)
        .bind(r.average_rating())
        .bind(r.total_reviews())
        .bind(r.updated_at)
        .execute(&self.db)
        .await
        .context("update recipe")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete recipe")?;
        Ok(res.rows_affected() > 0)
    }

    async fn search(&self, filter: &RecipeFilter) -> anyhow::Result<(Vec<Recipe>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes");
        filter.push_where(&mut count);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.db)
            .await
            .context("count recipes")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY ")
            .push(filter.sort.order_by_sql())
            .push(" LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset());
        let rows = qb
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.db)
            .await
            .context("search recipes")?;

        Ok((into_recipes(rows)?, total))
    }

    async fn count_by_author(&self, author_id: Uuid, public_only: bool) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recipes WHERE author_id = $1 AND (is_public OR NOT $2)",
        )
        .bind(author_id)
        .bind(public_only)
        .fetch_one(&self.db)
        .await
        .context("count recipes by author")?;
        Ok(n)
    }

    async fn top_authors(&self, limit: i64) -> anyhow::Result<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT author_id, COUNT(*) AS recipes
              FROM recipes
             WHERE is_public
             GROUP BY author_id
             ORDER BY recipes DESC, author_id ASC
             LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("rank authors")?;
        Ok(rows)
    }
}
