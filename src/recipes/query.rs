use std::{cmp::Ordering, str::FromStr};

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::recipes::model::{Category, Difficulty, Recipe};

pub const SEARCH_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 50;
pub const FEATURED_LIMIT: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    Rating,
    Time,
    Title,
    Popular,
}

impl FromStr for SortBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortBy::Newest),
            "oldest" => Ok(SortBy::Oldest),
            "rating" => Ok(SortBy::Rating),
            "time" => Ok(SortBy::Time),
            "title" => Ok(SortBy::Title),
            "popular" => Ok(SortBy::Popular),
            other => Err(AppError::validation(format!("`{other}` is not a valid sortBy"))),
        }
    }
}

impl SortBy {
    /// Always ends in `id` so paging is stable across requests.
    pub fn order_by_sql(&self) -> &'static str {
        match self {
            SortBy::Newest => "created_at DESC, id ASC",
            SortBy::Oldest => "created_at ASC, id ASC",
            SortBy::Rating => "average_rating DESC, total_reviews DESC, id ASC",
            SortBy::Time => "(prep_time::bigint + cook_time) ASC, id ASC",
            SortBy::Title => "lower(title) COLLATE \"C\" ASC, id ASC",
            SortBy::Popular => "cardinality(likes) DESC, id ASC",
        }
    }
}

/// Which slice of the collection a listing looks at.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Public,
    Featured,
    /// The caller's own recipes, private ones included.
    Author(Uuid),
    /// Someone's profile page.
    PublicByAuthor(Uuid),
    /// The caller's favorites, private ones included.
    Favorites(Vec<Uuid>),
    /// Someone else's favorites, as shown on their profile.
    PublicFavorites(Vec<Uuid>),
}

/// Raw query string. Everything is a string so bad values surface as
/// validation errors instead of extractor rejections; empty values mean unset.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub cuisine: Option<String>,
    pub difficulty: Option<String>,
    pub max_time: Option<String>,
    pub min_rating: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFilter {
    pub scope: Scope,
    pub terms: Vec<String>,
    pub category: Option<Category>,
    pub cuisine: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub max_time: Option<i64>,
    pub min_rating: Option<f64>,
    pub sort: SortBy,
    pub page: i64,
    pub limit: i64,
}

impl RecipeFilter {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            terms: Vec::new(),
            category: None,
            cuisine: None,
            difficulty: None,
            max_time: None,
            min_rating: None,
            sort: SortBy::default(),
            page: 1,
            limit: SEARCH_PAGE_SIZE,
        }
    }

    pub fn featured() -> Self {
        Self {
            limit: FEATURED_LIMIT,
            ..Self::new(Scope::Featured)
        }
    }

    pub fn from_params(scope: Scope, params: SearchParams) -> AppResult<Self> {
        let text = present(params.q).or(present(params.search));
        let max_time = present(params.max_time)
            .map(|v| {
                v.parse::<i64>()
                    .ok()
                    .filter(|m| *m >= 0)
                    .ok_or_else(|| AppError::validation("maxTime must be a non-negative integer"))
            })
            .transpose()?;
        let min_rating = present(params.min_rating)
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|r| (0.0..=5.0).contains(r))
                    .ok_or_else(|| AppError::validation("minRating must be a number between 0 and 5"))
            })
            .transpose()?;
        let page = present(params.page)
            .map(|v| {
                v.parse::<i64>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or_else(|| AppError::validation("page must be a positive integer"))
            })
            .transpose()?
            .unwrap_or(1);
        let limit = present(params.limit)
            .map(|v| {
                v.parse::<i64>()
                    .ok()
                    .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
                    .ok_or_else(|| {
                        AppError::validation(format!("limit must be between 1 and {MAX_PAGE_SIZE}"))
                    })
            })
            .transpose()?
            .unwrap_or(SEARCH_PAGE_SIZE);
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::validation("page is out of range"));
        }

        Ok(Self {
            scope,
            terms: text.map(|t| tokenize(&t)).unwrap_or_default(),
            category: present(params.category).map(|c| c.parse()).transpose()?,
            cuisine: present(params.cuisine),
            difficulty: present(params.difficulty).map(|d| d.parse()).transpose()?,
            max_time,
            min_rating,
            sort: present(params.sort_by)
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            page,
            limit,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn matches(&self, r: &Recipe) -> bool {
        let in_scope = match &self.scope {
            Scope::Public => r.is_public,
            Scope::Featured => r.is_public && r.is_featured,
            Scope::Author(id) => r.author_id == *id,
            Scope::PublicByAuthor(id) => r.is_public && r.author_id == *id,
            Scope::Favorites(ids) => ids.contains(&r.id),
            Scope::PublicFavorites(ids) => r.is_public && ids.contains(&r.id),
        };
        in_scope
            && self.category.map_or(true, |c| r.category == c)
            && self
                .cuisine
                .as_ref()
                .map_or(true, |c| r.cuisine.to_lowercase() == c.to_lowercase())
            && self.difficulty.map_or(true, |d| r.difficulty == d)
            && self.max_time.map_or(true, |m| r.total_time() <= m)
            && self.min_rating.map_or(true, |m| r.average_rating() >= m)
            && self.matches_terms(r)
    }

    fn matches_terms(&self, r: &Recipe) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {} {}",
            r.title,
            r.description,
            r.cuisine,
            r.tags.join(" ")
        );
        tokenize(&haystack).iter().any(|w| self.terms.contains(w))
    }

    pub fn compare(&self, a: &Recipe, b: &Recipe) -> Ordering {
        let primary = match self.sort {
            SortBy::Newest => b.created_at.cmp(&a.created_at),
            SortBy::Oldest => a.created_at.cmp(&b.created_at),
            SortBy::Rating => b
                .average_rating()
                .total_cmp(&a.average_rating())
                .then(b.total_reviews().cmp(&a.total_reviews())),
            SortBy::Time => a.total_time().cmp(&b.total_time()),
            SortBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortBy::Popular => b.likes_count().cmp(&a.likes_count()),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Filter, sort and cut one page out of an in-memory collection.
    pub fn apply<'a, I>(&self, recipes: I) -> (Vec<Recipe>, i64)
    where
        I: IntoIterator<Item = &'a Recipe>,
    {
        let mut hits: Vec<&Recipe> = recipes.into_iter().filter(|r| self.matches(r)).collect();
        hits.sort_by(|a, b| self.compare(a, b));
        let total = hits.len() as i64;
        let page = hits
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(0))
            .cloned()
            .collect();
        (page, total)
    }

    /// SQL counterpart of [`RecipeFilter::matches`].
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");
        match &self.scope {
            Scope::Public => {
                qb.push(" AND is_public");
            }
            Scope::Featured => {
                qb.push(" AND is_public AND is_featured");
            }
            Scope::Author(id) => {
                qb.push(" AND author_id = ").push_bind(*id);
            }
            Scope::PublicByAuthor(id) => {
                qb.push(" AND is_public AND author_id = ").push_bind(*id);
            }
            Scope::Favorites(ids) => {
                qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
            }
            Scope::PublicFavorites(ids) => {
                qb.push(" AND is_public AND id = ANY(")
                    .push_bind(ids.clone())
                    .push(")");
            }
        }
        if let Some(c) = self.category {
            qb.push(" AND category = ").push_bind(c.as_str());
        }
        if let Some(c) = &self.cuisine {
            qb.push(" AND lower(cuisine) = lower(")
                .push_bind(c.clone())
                .push(")");
        }
        if let Some(d) = self.difficulty {
            qb.push(" AND difficulty = ").push_bind(d.as_str());
        }
        if let Some(m) = self.max_time {
            qb.push(" AND (prep_time::bigint + cook_time) <= ").push_bind(m);
        }
        if let Some(m) = self.min_rating {
            qb.push(" AND average_rating >= ").push_bind(m);
        }
        if !self.terms.is_empty() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM regexp_split_to_table(lower(title || ' ' || \
                 description || ' ' || cuisine || ' ' || array_to_string(tags, ' ')), \
                 '[^[:alnum:]]+') AS w WHERE w = ANY(",
            )
            .push_bind(self.terms.clone())
            .push("))");
        }
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Lowercased alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
