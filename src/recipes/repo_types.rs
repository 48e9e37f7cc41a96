use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::recipes::model::{Ingredient, Instruction, Review};

/// Recipe document as stored: embedded lists live in JSONB, likes/tags in arrays.
#[derive(Debug, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub difficulty: String,
    pub cuisine: String,
    pub category: String,
    pub ingredients: Json<Vec<Ingredient>>,
    pub instructions: Json<Vec<Instruction>>,
    pub tags: Vec<String>,
    pub reviews: Json<Vec<Review>>,
    pub likes: Vec<Uuid>,
    pub is_public: bool,
    pub is_featured: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub const RECIPE_COLUMNS: &str = "id, author_id, title, description, image, prep_time, cook_time, \
     servings, difficulty, cuisine, category, ingredients, instructions, tags, reviews, likes, \
     is_public, is_featured, created_at, updated_at";
