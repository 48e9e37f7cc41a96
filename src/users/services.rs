use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    images,
    recipes::{
        dto::{FavoriteState, RecipeSummary},
        query::{RecipeFilter, Scope, SearchParams},
        services as recipe_services,
    },
    response::PageResponse,
    state::AppState,
    users::{
        dto::{FollowState, ProfileResponse, PublicProfile, TopChef},
        model::{AuthorSummary, User},
    },
};

pub const TOP_CHEFS_LIMIT: i64 = 6;

pub(crate) async fn load(st: &AppState, id: Uuid) -> AppResult<User> {
    st.users
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// Writes the user back; a user deleted since [`load`] is reported as missing.
pub(crate) async fn persist(st: &AppState, user: &User) -> AppResult<()> {
    if st.users.save(user).await? {
        Ok(())
    } else {
        Err(AppError::not_found("User"))
    }
}

/// Browser-usable avatar URL, empty when there is none.
pub(crate) async fn avatar_url(st: &AppState, user_id: Uuid, avatar: &str) -> AppResult<String> {
    let url = images::resolve_url(st, &images::avatar_owner(user_id), avatar).await?;
    Ok(url.unwrap_or_default())
}

/// The user as returned to its owner, with the avatar resolved.
pub(crate) async fn presented(st: &AppState, mut user: User) -> AppResult<User> {
    user.avatar = avatar_url(st, user.id, &user.avatar).await?;
    Ok(user)
}

async fn load_by_username(st: &AppState, username: &str) -> AppResult<User> {
    st.users
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn my_recipes(
    st: &AppState,
    user_id: Uuid,
    params: SearchParams,
) -> AppResult<PageResponse<RecipeSummary>> {
    let filter = RecipeFilter::from_params(Scope::Author(user_id), params)?;
    recipe_services::search(st, &filter).await
}

pub async fn favorites(
    st: &AppState,
    user_id: Uuid,
    params: SearchParams,
) -> AppResult<PageResponse<RecipeSummary>> {
    let user = load(st, user_id).await?;
    let filter = RecipeFilter::from_params(Scope::Favorites(user.favorite_recipes), params)?;
    recipe_services::search(st, &filter).await
}

pub async fn recipes_of(
    st: &AppState,
    username: &str,
    params: SearchParams,
) -> AppResult<PageResponse<RecipeSummary>> {
    let user = load_by_username(st, username).await?;
    let filter = RecipeFilter::from_params(Scope::PublicByAuthor(user.id), params)?;
    recipe_services::search(st, &filter).await
}

/// Someone's favorites as their profile shows them: public recipes only.
pub async fn public_favorites(
    st: &AppState,
    username: &str,
    params: SearchParams,
) -> AppResult<PageResponse<RecipeSummary>> {
    let user = load_by_username(st, username).await?;
    let filter = RecipeFilter::from_params(Scope::PublicFavorites(user.favorite_recipes), params)?;
    recipe_services::search(st, &filter).await
}

pub async fn profile(st: &AppState, username: &str) -> AppResult<ProfileResponse> {
    let user = load_by_username(st, username).await?;
    let recipe_count = st.recipes.count_by_author(user.id, true).await?;
    let (followers_count, following_count) = (user.followers.len(), user.following.len());
    let user = presented(st, user).await?;
    Ok(ProfileResponse {
        user: PublicProfile::from(user),
        recipe_count,
        followers_count,
        following_count,
    })
}

/// Authors with the most public recipes.
pub async fn top_chefs(st: &AppState) -> AppResult<Vec<TopChef>> {
    let ranked = st.recipes.top_authors(TOP_CHEFS_LIMIT).await?;
    let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
    let mut people: HashMap<Uuid, AuthorSummary> = st
        .users
        .summaries(&ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut chefs = Vec::with_capacity(ranked.len());
    for (id, recipe_count) in ranked {
        let Some(mut author) = people.remove(&id) else {
            continue;
        };
        author.avatar = avatar_url(st, id, &author.avatar).await?;
        chefs.push(TopChef {
            author,
            recipe_count,
        });
    }
    Ok(chefs)
}

/// Redirect target for a user's avatar.
pub async fn avatar_redirect(st: &AppState, user_id: Uuid) -> AppResult<String> {
    let user = load(st, user_id).await?;
    let url = avatar_url(st, user.id, &user.avatar).await?;
    if url.is_empty() {
        return Err(AppError::not_found("Avatar"));
    }
    Ok(url)
}

pub async fn toggle_favorite(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
) -> AppResult<FavoriteState> {
    recipe_services::load_visible(st, recipe_id, Some(user_id)).await?;
    let mut user = load(st, user_id).await?;
    let favorited = user.toggle_favorite(recipe_id);
    persist(st, &user).await?;
    info!(%user_id, %recipe_id, favorited, "favorite toggled");
    Ok(FavoriteState { favorited })
}

pub async fn follow(st: &AppState, user_id: Uuid, target_id: Uuid) -> AppResult<FollowState> {
    set_following(st, user_id, target_id, true).await
}

pub async fn unfollow(st: &AppState, user_id: Uuid, target_id: Uuid) -> AppResult<FollowState> {
    set_following(st, user_id, target_id, false).await
}

async fn set_following(
    st: &AppState,
    user_id: Uuid,
    target_id: Uuid,
    follow: bool,
) -> AppResult<FollowState> {
    if user_id == target_id {
        return Err(AppError::validation(if follow {
            "You cannot follow yourself"
        } else {
            "You cannot unfollow yourself"
        }));
    }
    let mut target = load(st, target_id).await?;
    let mut me = load(st, user_id).await?;
    if follow {
        me.follow(&mut target)?;
    } else {
        me.unfollow(&mut target)?;
    }
    if !st.users.save_pair(&me, &target).await? {
        return Err(AppError::not_found("User"));
    }
    info!(%user_id, %target_id, follow, "follow state changed");
    Ok(FollowState {
        following: follow,
        followers: target.followers.len(),
    })
}
