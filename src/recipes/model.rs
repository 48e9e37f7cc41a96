use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::images;
use crate::recipes::repo_types::RecipeRow;

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;
pub const COMMENT_MAX: usize = 500;
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;
pub const PREP_TIME_MAX: i32 = 100_000;
pub const COOK_TIME_MAX: i32 = 100_000;
pub const SERVINGS_MAX: i32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(AppError::validation(format!(
                "`{other}` is not a valid difficulty"
            ))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    Dessert,
    Snack,
    Beverage,
    Appetizer,
    Soup,
    Salad,
    Bread,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Breakfast,
        Category::Lunch,
        Category::Dinner,
        Category::Dessert,
        Category::Snack,
        Category::Beverage,
        Category::Appetizer,
        Category::Soup,
        Category::Salad,
        Category::Bread,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breakfast => "Breakfast",
            Category::Lunch => "Lunch",
            Category::Dinner => "Dinner",
            Category::Dessert => "Dessert",
            Category::Snack => "Snack",
            Category::Beverage => "Beverage",
            Category::Appetizer => "Appetizer",
            Category::Soup => "Soup",
            Category::Salad => "Salad",
            Category::Bread => "Bread",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("`{s}` is not a valid recipe category")))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub step: i32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields a client may send on create or update. Absent fields are left
/// untouched on update and rejected on create when required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub category: Option<String>,
    pub ingredients: Option<Vec<IngredientInput>>,
    pub instructions: Option<Vec<InstructionInput>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngredientInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Step numbers sent by the client are ignored; list order decides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstructionInput {
    #[serde(default)]
    pub description: String,
}

impl RecipeInput {
    fn check_required(&self) -> AppResult<()> {
        let missing = [
            (self.title.is_none(), "Recipe title"),
            (self.description.is_none(), "Recipe description"),
            (self.prep_time.is_none(), "Preparation time"),
            (self.cook_time.is_none(), "Cooking time"),
            (self.servings.is_none(), "Number of servings"),
            (self.cuisine.is_none(), "Cuisine type"),
            (self.category.is_none(), "Recipe category"),
        ];
        match missing.iter().find(|(absent, _)| *absent) {
            Some((_, what)) => Err(AppError::validation(format!("{what} is required"))),
            None => Ok(()),
        }
    }
}

/// One recipe document: scalar fields plus its embedded lists.
///
/// `average_rating` and `total_reviews` are a cache of `reviews` and have no
/// setters; every review mutation ends with [`Recipe::refresh_derived`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub difficulty: Difficulty,
    pub cuisine: String,
    pub category: Category,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<Instruction>,
    pub tags: Vec<String>,
    pub reviews: Vec<Review>,
    pub likes: Vec<Uuid>,
    pub is_public: bool,
    pub is_featured: bool,
    average_rating: f64,
    total_reviews: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Recipe {
    pub fn create(author_id: Uuid, input: RecipeInput, now: OffsetDateTime) -> AppResult<Self> {
        input.check_required()?;
        let mut recipe = Recipe {
            id: Uuid::new_v4(),
            author_id,
            title: String::new(),
            description: String::new(),
            image: String::new(),
            prep_time: 0,
            cook_time: 0,
            servings: 0,
            difficulty: Difficulty::default(),
            cuisine: String::new(),
            category: Category::Other,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            tags: Vec::new(),
            reviews: Vec::new(),
            likes: Vec::new(),
            is_public: true,
            is_featured: false,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        };
        recipe.apply_fields(input)?;
        validate_recipe(&recipe)?;
        Ok(recipe)
    }

    /// Applies a patch as a unit: on error `self` is left as it was.
    pub fn update(&mut self, patch: RecipeInput, now: OffsetDateTime) -> AppResult<()> {
        let mut next = self.clone();
        next.apply_fields(patch)?;
        validate_recipe(&next)?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    fn apply_fields(&mut self, input: RecipeInput) -> AppResult<()> {
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            self.description = description.trim().to_string();
        }
        if let Some(image) = input.image {
            let image = image.trim();
            // Stored keys are only ever set by the upload path.
            if images::is_object_key(image) && image != self.image {
                return Err(AppError::validation(
                    "Image must be an external URL or uploaded through the image endpoint",
                ));
            }
            self.image = image.to_string();
        }
        if let Some(v) = input.prep_time {
            self.prep_time = to_i32(v, "Preparation time")?;
        }
        if let Some(v) = input.cook_time {
            self.cook_time = to_i32(v, "Cooking time")?;
        }
        if let Some(v) = input.servings {
            self.servings = to_i32(v, "Servings")?;
        }
        if let Some(d) = input.difficulty {
            self.difficulty = d.parse()?;
        }
        if let Some(cuisine) = input.cuisine {
            self.cuisine = cuisine.trim().to_string();
        }
        if let Some(c) = input.category {
            self.category = c.parse()?;
        }
        if let Some(ingredients) = input.ingredients {
            self.ingredients = ingredients
                .into_iter()
                .map(|i| Ingredient {
                    name: i.name.trim().to_string(),
                    amount: i.amount.trim().to_string(),
                    unit: i.unit.unwrap_or_default().trim().to_string(),
                })
                .collect();
        }
        if let Some(instructions) = input.instructions {
            let mut list: Vec<Instruction> = instructions
                .into_iter()
                .map(|i| Instruction {
                    step: 0,
                    description: i.description.trim().to_string(),
                })
                .collect();
            renumber(&mut list);
            self.instructions = list;
        }
        if let Some(tags) = input.tags {
            self.tags = tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(is_public) = input.is_public {
            self.is_public = is_public;
        }
        Ok(())
    }

    pub fn ensure_author(&self, user_id: Uuid) -> AppResult<()> {
        if self.author_id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Not authorized to modify this recipe".into(),
            ))
        }
    }

    /// Private recipes exist only for their author.
    pub fn is_visible_to(&self, viewer: Option<Uuid>) -> bool {
        self.is_public || viewer == Some(self.author_id)
    }

    pub fn add_or_replace_review(
        &mut self,
        user_id: Uuid,
        rating: i64,
        comment: Option<String>,
        now: OffsetDateTime,
    ) -> AppResult<()> {
        let comment = comment.unwrap_or_default().trim().to_string();
        validate_review(rating, &comment)?;

        self.reviews.retain(|r| r.user_id != user_id);
        self.reviews.push(Review {
            user_id,
            rating: rating as i32,
            comment,
            created_at: now,
        });
        self.updated_at = now;
        self.refresh_derived();
        Ok(())
    }

    /// Returns whether `user_id` likes the recipe afterwards.
    pub fn toggle_like(&mut self, user_id: Uuid, now: OffsetDateTime) -> bool {
        self.updated_at = now;
        match self.likes.iter().position(|id| *id == user_id) {
            Some(idx) => {
                self.likes.remove(idx);
                false
            }
            None => {
                self.likes.push(user_id);
                true
            }
        }
    }

    pub fn remove_instruction(&mut self, index: usize, now: OffsetDateTime) -> AppResult<()> {
        if index >= self.instructions.len() {
            return Err(AppError::not_found("Instruction"));
        }
        let current = std::mem::take(&mut self.instructions);
        self.instructions = reorder_after_instruction_removal(current, index);
        self.updated_at = now;
        Ok(())
    }

    pub fn refresh_derived(&mut self) {
        let (average, total) = recompute_rating(&self.reviews);
        self.average_rating = average;
        self.total_reviews = total;
    }

    pub fn average_rating(&self) -> f64 {
        self.average_rating
    }

    pub fn total_reviews(&self) -> i32 {
        self.total_reviews
    }

    pub fn total_time(&self) -> i64 {
        i64::from(self.prep_time) + i64::from(self.cook_time)
    }

    pub fn likes_count(&self) -> usize {
        self.likes.len()
    }
}

impl TryFrom<RecipeRow> for Recipe {
    type Error = AppError;

    fn try_from(row: RecipeRow) -> Result<Self, Self::Error> {
        let mut recipe = Recipe {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            description: row.description,
            image: row.image,
            prep_time: row.prep_time,
            cook_time: row.cook_time,
            servings: row.servings,
            difficulty: row.difficulty.parse()?,
            cuisine: row.cuisine,
            category: row.category.parse()?,
            ingredients: row.ingredients.0,
            instructions: row.instructions.0,
            tags: row.tags,
            reviews: row.reviews.0,
            likes: row.likes,
            is_public: row.is_public,
            is_featured: row.is_featured,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        recipe.refresh_derived();
        Ok(recipe)
    }
}

/// Mean rating and review count; `(0.0, 0)` for no reviews.
pub fn recompute_rating(reviews: &[Review]) -> (f64, i32) {
    if reviews.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    (sum as f64 / reviews.len() as f64, reviews.len() as i32)
}

pub fn reorder_after_instruction_removal(
    mut instructions: Vec<Instruction>,
    removed_index: usize,
) -> Vec<Instruction> {
    if removed_index < instructions.len() {
        instructions.remove(removed_index);
    }
    renumber(&mut instructions);
    instructions
}

fn renumber(instructions: &mut [Instruction]) {
    for (i, ins) in instructions.iter_mut().enumerate() {
        ins.step = i as i32 + 1;
    }
}

fn to_i32(v: i64, what: &str) -> AppResult<i32> {
    i32::try_from(v).map_err(|_| AppError::validation(format!("{what} is out of range")))
}

/// First violated constraint wins.
pub fn validate_recipe(r: &Recipe) -> AppResult<()> {
    if r.title.is_empty() {
        return Err(AppError::validation("Recipe title is required"));
    }
    if r.title.chars().count() > TITLE_MAX {
        return Err(AppError::validation(format!(
            "Title cannot exceed {TITLE_MAX} characters"
        )));
    }
    if r.description.is_empty() {
        return Err(AppError::validation("Recipe description is required"));
    }
    if r.description.chars().count() > DESCRIPTION_MAX {
        return Err(AppError::validation(format!(
            "Description cannot exceed {DESCRIPTION_MAX} characters"
        )));
    }
    if r.prep_time < 1 {
        return Err(AppError::validation(
            "Preparation time must be at least 1 minute",
        ));
    }
    if r.prep_time > PREP_TIME_MAX {
        return Err(AppError::validation(format!(
            "Preparation time cannot exceed {PREP_TIME_MAX} minutes"
        )));
    }
    if r.cook_time < 0 {
        return Err(AppError::validation("Cooking time cannot be negative"));
    }
    if r.cook_time > COOK_TIME_MAX {
        return Err(AppError::validation(format!(
            "Cooking time cannot exceed {COOK_TIME_MAX} minutes"
        )));
    }
    if r.servings < 1 {
        return Err(AppError::validation("Servings must be at least 1"));
    }
    if r.servings > SERVINGS_MAX {
        return Err(AppError::validation(format!(
            "Servings cannot exceed {SERVINGS_MAX}"
        )));
    }
    if r.cuisine.is_empty() {
        return Err(AppError::validation("Cuisine type is required"));
    }
    for ingredient in &r.ingredients {
        if ingredient.name.is_empty() {
            return Err(AppError::validation("Ingredient name is required"));
        }
        if ingredient.amount.is_empty() {
            return Err(AppError::validation("Ingredient amount is required"));
        }
    }
    if r.instructions.iter().any(|i| i.description.is_empty()) {
        return Err(AppError::validation(
            "Instruction description is required",
        ));
    }
    Ok(())
}

pub fn validate_review(rating: i64, comment: &str) -> AppResult<()> {
    if rating < RATING_MIN {
        return Err(AppError::validation("Rating must be at least 1"));
    }
    if rating > RATING_MAX {
        return Err(AppError::validation("Rating cannot exceed 5"));
    }
    if comment.chars().count() > COMMENT_MAX {
        return Err(AppError::validation(format!(
            "Comment cannot exceed {COMMENT_MAX} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn input() -> RecipeInput {
        RecipeInput {
            title: Some("  Lemon Tart ".into()),
            description: Some("Sharp and sweet".into()),
            prep_time: Some(20),
            cook_time: Some(35),
            servings: Some(8),
            cuisine: Some("French".into()),
            category: Some("Dessert".into()),
            ingredients: Some(vec![IngredientInput {
                name: "Lemon".into(),
                amount: "3".into(),
                unit: None,
            }]),
            instructions: Some(vec![
                InstructionInput {
                    description: "Zest".into(),
                },
                InstructionInput {
                    description: "Bake".into(),
                },
            ]),
            tags: Some(vec!["citrus".into(), " ".into()]),
            ..Default::default()
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn recipe() -> Recipe {
        Recipe::create(Uuid::new_v4(), input(), now()).expect("valid recipe")
    }

    fn assert_derived_consistent(r: &Recipe) {
        assert_eq!(r.total_reviews() as usize, r.reviews.len());
        if r.reviews.is_empty() {
            assert_eq!(r.average_rating(), 0.0);
        } else {
            let sum: i32 = r.reviews.iter().map(|x| x.rating).sum();
            assert_eq!(r.average_rating(), sum as f64 / r.reviews.len() as f64);
            assert!(r.average_rating() > 0.0 && r.average_rating() <= 5.0);
        }
    }

    #[test]
    fn create_applies_defaults_and_trims() {
        let r = recipe();
        assert_eq!(r.title, "Lemon Tart");
        assert_eq!(r.difficulty, Difficulty::Medium);
        assert_eq!(r.category, Category::Dessert);
        assert!(r.is_public);
        assert!(!r.is_featured);
        assert_eq!(r.tags, vec!["citrus".to_string()]);
        assert_eq!(r.ingredients[0].unit, "");
        assert_eq!(r.total_time(), 55);
        assert_eq!(r.average_rating(), 0.0);
        assert_eq!(r.total_reviews(), 0);
        assert!(r.reviews.is_empty() && r.likes.is_empty());
    }

    #[test]
    fn create_numbers_instruction_steps() {
        let r = recipe();
        let steps: Vec<i32> = r.instructions.iter().map(|i| i.step).collect();
        assert_eq!(steps, vec![1, 2]);
    }

    #[test]
    fn create_rejects_zero_prep_time() {
        let mut i = input();
        i.prep_time = Some(0);
        let err = Recipe::create(Uuid::new_v4(), i, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("Preparation time"));
    }

    #[test]
    fn create_rejects_negative_cook_time() {
        let mut i = input();
        i.cook_time = Some(-1);
        let err = Recipe::create(Uuid::new_v4(), i, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("Cooking time"));
    }

    #[test]
    fn create_accepts_zero_cook_time() {
        let mut i = input();
        i.cook_time = Some(0);
        assert!(Recipe::create(Uuid::new_v4(), i, now()).is_ok());
    }

    #[test]
    fn time_and_servings_have_upper_bounds() {
        let mut i = input();
        i.prep_time = Some(PREP_TIME_MAX.into());
        i.cook_time = Some(COOK_TIME_MAX.into());
        let r = Recipe::create(Uuid::new_v4(), i, now()).unwrap();
        assert_eq!(r.total_time(), 200_000);

        let mut i = input();
        i.prep_time = Some(i64::from(i32::MAX));
        i.cook_time = Some(1);
        let err = Recipe::create(Uuid::new_v4(), i, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("Preparation time cannot exceed"));

        let mut i = input();
        i.cook_time = Some(i64::from(COOK_TIME_MAX) + 1);
        assert!(Recipe::create(Uuid::new_v4(), i, now()).is_err());

        let mut i = input();
        i.servings = Some(i64::from(SERVINGS_MAX) + 1);
        assert!(Recipe::create(Uuid::new_v4(), i, now()).is_err());
    }

    #[test]
    fn total_time_does_not_overflow_on_stored_values() {
        let mut r = recipe();
        r.prep_time = i32::MAX;
        r.cook_time = i32::MAX;
        assert_eq!(r.total_time(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn client_cannot_point_image_at_a_stored_key() {
        let mut i = input();
        i.image = Some("recipes/someone/else.jpg".into());
        assert!(matches!(
            Recipe::create(Uuid::new_v4(), i, now()),
            Err(AppError::Validation(_))
        ));

        let mut r = recipe();
        r.image = format!("recipes/{}/{}-a.jpg", r.author_id, r.id);
        let own = r.image.clone();
        let patch = RecipeInput {
            image: Some(own.clone()),
            ..Default::default()
        };
        r.update(patch, now()).unwrap();
        assert_eq!(r.image, own);

        let patch = RecipeInput {
            image: Some("recipes/victim/other-b.jpg".into()),
            ..Default::default()
        };
        assert!(r.update(patch, now()).is_err());
        assert_eq!(r.image, own);

        let patch = RecipeInput {
            image: Some("https://cdn.example.com/tart.jpg".into()),
            ..Default::default()
        };
        r.update(patch, now()).unwrap();
        assert_eq!(r.image, "https://cdn.example.com/tart.jpg");
    }

    #[test]
    fn create_reports_first_missing_field() {
        let mut i = input();
        i.description = None;
        i.servings = None;
        let err = Recipe::create(Uuid::new_v4(), i, now()).unwrap_err();
        assert_eq!(err.to_string(), "Recipe description is required");
    }

    #[test]
    fn create_rejects_unknown_category_and_difficulty() {
        let mut i = input();
        i.category = Some("Brunch".into());
        assert!(matches!(
            Recipe::create(Uuid::new_v4(), i, now()),
            Err(AppError::Validation(_))
        ));

        let mut i = input();
        i.difficulty = Some("Extreme".into());
        assert!(matches!(
            Recipe::create(Uuid::new_v4(), i, now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn create_enforces_length_limits() {
        let mut i = input();
        i.title = Some("x".repeat(TITLE_MAX + 1));
        assert!(Recipe::create(Uuid::new_v4(), i, now()).is_err());

        let mut i = input();
        i.description = Some("x".repeat(DESCRIPTION_MAX + 1));
        assert!(Recipe::create(Uuid::new_v4(), i, now()).is_err());

        let mut i = input();
        i.title = Some("   ".into());
        assert_eq!(
            Recipe::create(Uuid::new_v4(), i, now()).unwrap_err().to_string(),
            "Recipe title is required"
        );
    }

    #[test]
    fn create_rejects_blank_ingredient_amount() {
        let mut i = input();
        i.ingredients = Some(vec![IngredientInput {
            name: "Salt".into(),
            amount: " ".into(),
            unit: Some("tsp".into()),
        }]);
        assert_eq!(
            Recipe::create(Uuid::new_v4(), i, now()).unwrap_err().to_string(),
            "Ingredient amount is required"
        );
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut r = recipe();
        let before = r.clone();
        let patch = RecipeInput {
            title: Some("Lime Tart".into()),
            servings: Some(0),
            ..Default::default()
        };
        assert!(r.update(patch, now()).is_err());
        assert_eq!(r, before);

        let patch = RecipeInput {
            title: Some("Lime Tart".into()),
            ..Default::default()
        };
        r.update(patch, now()).unwrap();
        assert_eq!(r.title, "Lime Tart");
        assert_eq!(r.servings, before.servings);
    }

    #[test]
    fn ensure_author_rejects_others() {
        let r = recipe();
        assert!(r.ensure_author(r.author_id).is_ok());
        assert!(matches!(
            r.ensure_author(Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn empty_reviews_have_zero_rating() {
        assert_eq!(recompute_rating(&[]), (0.0, 0));
        assert_derived_consistent(&recipe());
    }

    #[test]
    fn review_replacement_scenario() {
        let mut r = recipe();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        r.add_or_replace_review(u1, 5, None, now()).unwrap();
        r.add_or_replace_review(u2, 3, None, now()).unwrap();
        assert_eq!(r.average_rating(), 4.0);
        assert_eq!(r.total_reviews(), 2);

        r.add_or_replace_review(u1, 1, Some("meh".into()), now()).unwrap();
        let order: Vec<(Uuid, i32)> = r.reviews.iter().map(|x| (x.user_id, x.rating)).collect();
        assert_eq!(order, vec![(u2, 3), (u1, 1)]);
        assert_eq!(r.reviews[1].comment, "meh");
        assert_eq!(r.average_rating(), 2.0);
        assert_eq!(r.total_reviews(), 2);
        assert_derived_consistent(&r);
    }

    #[test]
    fn same_user_keeps_only_latest_review() {
        let mut r = recipe();
        let u = Uuid::new_v4();
        r.add_or_replace_review(u, 2, None, now()).unwrap();
        r.add_or_replace_review(u, 4, None, now()).unwrap();
        let mine: Vec<_> = r.reviews.iter().filter(|x| x.user_id == u).collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].rating, 4);
        assert_derived_consistent(&r);
    }

    #[test]
    fn review_rating_and_comment_are_validated() {
        let mut r = recipe();
        let u = Uuid::new_v4();
        assert!(r.add_or_replace_review(u, 0, None, now()).is_err());
        assert!(r.add_or_replace_review(u, 6, None, now()).is_err());
        assert!(r
            .add_or_replace_review(u, 3, Some("x".repeat(COMMENT_MAX + 1)), now())
            .is_err());
        assert!(r.reviews.is_empty());
        assert_derived_consistent(&r);
    }

    #[test]
    fn double_toggle_restores_likes() {
        let mut r = recipe();
        let other = Uuid::new_v4();
        r.toggle_like(other, now());
        let before = r.likes.clone();

        let u = Uuid::new_v4();
        assert!(r.toggle_like(u, now()));
        assert_eq!(r.likes_count(), 2);
        assert!(!r.toggle_like(u, now()));
        assert_eq!(r.likes, before);
    }

    #[test]
    fn instruction_removal_renumbers_in_order() {
        let list: Vec<Instruction> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, d)| Instruction {
                step: i as i32 + 1,
                description: d.to_string(),
            })
            .collect();

        let out = reorder_after_instruction_removal(list.clone(), 1);
        let got: Vec<(i32, &str)> = out.iter().map(|i| (i.step, i.description.as_str())).collect();
        assert_eq!(got, vec![(1, "a"), (2, "c"), (3, "d")]);

        let out = reorder_after_instruction_removal(list, 9);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn remove_instruction_out_of_range_is_not_found() {
        let mut r = recipe();
        assert!(matches!(
            r.remove_instruction(5, now()),
            Err(AppError::NotFound(_))
        ));
        r.remove_instruction(0, now()).unwrap();
        assert_eq!(r.instructions.len(), 1);
        assert_eq!(r.instructions[0].step, 1);
        assert_eq!(r.instructions[0].description, "Bake");
    }

    #[test]
    fn private_recipe_visible_only_to_author() {
        let mut r = recipe();
        r.is_public = false;
        assert!(r.is_visible_to(Some(r.author_id)));
        assert!(!r.is_visible_to(Some(Uuid::new_v4())));
        assert!(!r.is_visible_to(None));
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
    }
}
