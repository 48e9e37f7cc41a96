use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::model::{Category, Difficulty, Ingredient, Instruction, Recipe};
use crate::users::model::AuthorSummary;

/// Author lookups for a batch of recipes, keyed by user id.
pub type Authors = HashMap<Uuid, AuthorSummary>;

/// Listing card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub total_time: i64,
    pub servings: i32,
    pub difficulty: Difficulty,
    pub cuisine: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub likes: Vec<Uuid>,
    pub is_public: bool,
    pub is_featured: bool,
    pub author: Option<AuthorSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RecipeSummary {
    pub fn new(r: Recipe, authors: &Authors) -> Self {
        Self {
            total_time: r.total_time(),
            average_rating: r.average_rating(),
            total_reviews: r.total_reviews(),
            author: authors.get(&r.author_id).cloned(),
            id: r.id,
            title: r.title,
            description: r.description,
            image: r.image,
            prep_time: r.prep_time,
            cook_time: r.cook_time,
            servings: r.servings,
            difficulty: r.difficulty,
            cuisine: r.cuisine,
            category: r.category,
            tags: r.tags,
            likes: r.likes,
            is_public: r.is_public,
            is_featured: r.is_featured,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub user: Option<AuthorSummary>,
    pub rating: i32,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Full recipe with author and reviewers populated.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDetails {
    pub id: Uuid,
    pub author: Option<AuthorSummary>,
    pub title: String,
    pub description: String,
    pub image: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub total_time: i64,
    pub servings: i32,
    pub difficulty: Difficulty,
    pub cuisine: String,
    pub category: Category,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
    pub tags: Vec<String>,
    pub reviews: Vec<ReviewView>,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub likes: Vec<Uuid>,
    pub is_public: bool,
    pub is_featured: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl RecipeDetails {
    pub fn new(r: Recipe, people: &Authors) -> Self {
        let reviews = r
            .reviews
            .iter()
            .map(|rev| ReviewView {
                user: people.get(&rev.user_id).cloned(),
                rating: rev.rating,
                comment: rev.comment.clone(),
                created_at: rev.created_at,
            })
            .collect();
        Self {
            total_time: r.total_time(),
            average_rating: r.average_rating(),
            total_reviews: r.total_reviews(),
            author: people.get(&r.author_id).cloned(),
            reviews,
            id: r.id,
            title: r.title,
            description: r.description,
            image: r.image,
            prep_time: r.prep_time,
            cook_time: r.cook_time,
            servings: r.servings,
            difficulty: r.difficulty,
            cuisine: r.cuisine,
            category: r.category,
            ingredients: r.ingredients,
            instructions: r.instructions,
            tags: r.tags,
            likes: r.likes,
            is_public: r.is_public,
            is_featured: r.is_featured,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Debug, Serialize)]
pub struct FavoriteState {
    pub favorited: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::model::tests::input;
    use crate::users::model::tests::user;

    #[test]
    fn details_populate_author_and_reviewers() {
        let chef = user("chef");
        let critic = user("critic");
        let now = OffsetDateTime::now_utc();
        let mut r = Recipe::create(chef.id, input(), now).unwrap();
        r.add_or_replace_review(critic.id, 4, Some("Nice".into()), now)
            .unwrap();

        let people: Authors = [chef.summary(), critic.summary()]
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let json = serde_json::to_value(RecipeDetails::new(r, &people)).unwrap();

        assert_eq!(json["author"]["username"], "chef");
        assert_eq!(json["reviews"][0]["user"]["username"], "critic");
        assert_eq!(json["averageRating"], 4.0);
        assert_eq!(json["totalReviews"], 1);
        assert_eq!(json["totalTime"], 55);
        assert_eq!(json["category"], "Dessert");
    }

    #[test]
    fn summary_without_known_author_serializes_null() {
        let r = Recipe::create(Uuid::new_v4(), input(), OffsetDateTime::now_utc()).unwrap();
        let json = serde_json::to_value(RecipeSummary::new(r, &Authors::new())).unwrap();
        assert!(json["author"].is_null());
        assert_eq!(json["isPublic"], true);
    }
}
