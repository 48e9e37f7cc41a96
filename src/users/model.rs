use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 500;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub bio: String,
    pub favorite_recipes: Vec<Uuid>,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// What other users get to see next to a recipe or review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            first_name,
            last_name,
            avatar: String::new(),
            bio: String::new(),
            favorite_recipes: Vec::new(),
            followers: Vec::new(),
            following: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Applies the editable profile fields together; on error nothing changes.
    pub fn update_profile(
        &mut self,
        first_name: Option<String>,
        last_name: Option<String>,
        bio: Option<String>,
    ) -> AppResult<()> {
        let first_name = first_name.map(|n| n.trim().to_string());
        let last_name = last_name.map(|n| n.trim().to_string());
        let bio = bio.map(|b| b.trim().to_string());
        for name in [&first_name, &last_name].into_iter().flatten() {
            if name.is_empty() {
                return Err(AppError::validation("First and last name are required"));
            }
            if name.chars().count() > NAME_MAX {
                return Err(AppError::validation(format!(
                    "Names cannot exceed {NAME_MAX} characters"
                )));
            }
        }
        if bio.as_ref().map_or(false, |b| b.chars().count() > BIO_MAX) {
            return Err(AppError::validation(format!(
                "Bio cannot exceed {BIO_MAX} characters"
            )));
        }
        if let Some(n) = first_name {
            self.first_name = n;
        }
        if let Some(n) = last_name {
            self.last_name = n;
        }
        if let Some(b) = bio {
            self.bio = b;
        }
        Ok(())
    }

    /// Returns whether the recipe is a favorite afterwards.
    pub fn toggle_favorite(&mut self, recipe_id: Uuid) -> bool {
        if remove_id(&mut self.favorite_recipes, recipe_id) {
            false
        } else {
            self.favorite_recipes.push(recipe_id);
            true
        }
    }

    pub fn follow(&mut self, target: &mut User) -> AppResult<()> {
        if self.id == target.id {
            return Err(AppError::validation("You cannot follow yourself"));
        }
        insert_id(&mut self.following, target.id);
        insert_id(&mut target.followers, self.id);
        Ok(())
    }

    pub fn unfollow(&mut self, target: &mut User) -> AppResult<()> {
        if self.id == target.id {
            return Err(AppError::validation("You cannot unfollow yourself"));
        }
        remove_id(&mut self.following, target.id);
        remove_id(&mut target.followers, self.id);
        Ok(())
    }
}

fn insert_id(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    if set.contains(&id) {
        return false;
    }
    set.push(id);
    true
}

fn remove_id(set: &mut Vec<Uuid>, id: Uuid) -> bool {
    let before = set.len();
    set.retain(|x| *x != id);
    set.len() != before
}
