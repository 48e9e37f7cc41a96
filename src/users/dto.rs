use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::model::{AuthorSummary, User};

/// The part of a user anyone may see. Email, favorites and the follow
/// lists stay private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub bio: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            avatar: u.avatar,
            bio: u.bio,
            created_at: u.created_at,
        }
    }
}

/// Public profile page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: PublicProfile,
    pub recipe_count: i64,
    pub followers_count: usize,
    pub following_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopChef {
    #[serde(flatten)]
    pub author: AuthorSummary,
    pub recipe_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FollowState {
    pub following: bool,
    pub followers: usize,
}
