use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    images::{self, UploadItem},
    recipes::{
        dto::{Authors, LikeState, RecipeDetails, RecipeSummary, ReviewRequest},
        model::{Recipe, RecipeInput},
        query::RecipeFilter,
    },
    response::PageResponse,
    state::AppState,
};

pub(crate) async fn load(st: &AppState, id: Uuid) -> AppResult<Recipe> {
    st.recipes
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe"))
}

/// Private recipes look missing to everyone but their author.
pub(crate) async fn load_visible(
    st: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<Recipe> {
    let recipe = load(st, id).await?;
    if recipe.is_visible_to(viewer) {
        Ok(recipe)
    } else {
        Err(AppError::not_found("Recipe"))
    }
}

/// Writes the recipe back; a row deleted since [`load`] is reported as missing.
async fn persist(st: &AppState, recipe: &Recipe) -> AppResult<()> {
    if st.recipes.save(recipe).await? {
        Ok(())
    } else {
        Err(AppError::not_found("Recipe"))
    }
}

async fn authors_of(st: &AppState, mut ids: Vec<Uuid>) -> AppResult<Authors> {
    ids.sort_unstable();
    ids.dedup();
    let found = st.users.summaries(&ids).await?;
    Ok(found.into_iter().map(|a| (a.id, a)).collect())
}

async fn details(st: &AppState, recipe: Recipe) -> AppResult<RecipeDetails> {
    let mut ids: Vec<Uuid> = recipe.reviews.iter().map(|r| r.user_id).collect();
    ids.push(recipe.author_id);
    let people = authors_of(st, ids).await?;
    Ok(RecipeDetails::new(recipe, &people))
}

async fn summaries(st: &AppState, recipes: Vec<Recipe>) -> AppResult<Vec<RecipeSummary>> {
    let authors = authors_of(st, recipes.iter().map(|r| r.author_id).collect()).await?;
    Ok(recipes
        .into_iter()
        .map(|r| RecipeSummary::new(r, &authors))
        .collect())
}

pub async fn create_recipe(
    st: &AppState,
    author_id: Uuid,
    input: RecipeInput,
) -> AppResult<RecipeDetails> {
    let recipe = Recipe::create(author_id, input, OffsetDateTime::now_utc())?;
    st.recipes.insert(&recipe).await?;
    info!(recipe_id = %recipe.id, %author_id, "recipe created");
    details(st, recipe).await
}

pub async fn get_recipe(
    st: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<RecipeDetails> {
    let recipe = load_visible(st, id, viewer).await?;
    details(st, recipe).await
}

/// Field patch plus an optional new image, saved together.
pub async fn update_recipe(
    st: &AppState,
    id: Uuid,
    user_id: Uuid,
    patch: RecipeInput,
    image: Option<UploadItem>,
) -> AppResult<RecipeDetails> {
    if let Some(item) = &image {
        images::check_type(item)?;
    }
    let mut recipe = load(st, id).await?;
    recipe.ensure_author(user_id)?;
    let old_image = recipe.image.clone();
    recipe.update(patch, OffsetDateTime::now_utc())?;

    let owner = images::recipe_owner(&recipe);
    if let Some(item) = image {
        recipe.image = images::upload(st, &owner, item).await?;
    }
    if let Err(e) = persist(st, &recipe).await {
        if recipe.image != old_image {
            images::discard(st, &owner, &recipe.image).await;
        }
        return Err(e);
    }
    if recipe.image != old_image {
        images::discard(st, &owner, &old_image).await;
    }
    info!(recipe_id = %id, "recipe updated");
    details(st, recipe).await
}

pub async fn delete_recipe(st: &AppState, id: Uuid, user_id: Uuid) -> AppResult<()> {
    let recipe = load(st, id).await?;
    recipe.ensure_author(user_id)?;
    if !st.recipes.delete(id).await? {
        return Err(AppError::not_found("Recipe"));
    }
    let cleared = st.users.remove_favorite_everywhere(id).await?;
    images::discard(st, &images::recipe_owner(&recipe), &recipe.image).await;
    info!(recipe_id = %id, favorites_cleared = cleared, "recipe deleted");
    Ok(())
}

pub async fn add_review(
    st: &AppState,
    id: Uuid,
    user_id: Uuid,
    req: ReviewRequest,
) -> AppResult<RecipeDetails> {
    let rating = req
        .rating
        .ok_or_else(|| AppError::validation("Rating is required"))?;
    let mut recipe = load_visible(st, id, Some(user_id)).await?;
    recipe.add_or_replace_review(user_id, rating, req.comment, OffsetDateTime::now_utc())?;
    persist(st, &recipe).await?;
    info!(
        recipe_id = %id,
        %user_id,
        average = recipe.average_rating(),
        total = recipe.total_reviews(),
        "review saved"
    );
    details(st, recipe).await
}

pub async fn toggle_like(st: &AppState, id: Uuid, user_id: Uuid) -> AppResult<LikeState> {
    let mut recipe = load_visible(st, id, Some(user_id)).await?;
    let liked = recipe.toggle_like(user_id, OffsetDateTime::now_utc());
    persist(st, &recipe).await?;
    debug!(recipe_id = %id, %user_id, liked, "like toggled");
    Ok(LikeState {
        liked,
        likes: recipe.likes_count(),
    })
}

pub async fn remove_instruction(
    st: &AppState,
    id: Uuid,
    user_id: Uuid,
    index: usize,
) -> AppResult<RecipeDetails> {
    let mut recipe = load(st, id).await?;
    recipe.ensure_author(user_id)?;
    recipe.remove_instruction(index, OffsetDateTime::now_utc())?;
    persist(st, &recipe).await?;
    details(st, recipe).await
}

pub async fn search(st: &AppState, filter: &RecipeFilter) -> AppResult<PageResponse<RecipeSummary>> {
    let (recipes, total) = st.recipes.search(filter).await?;
    debug!(total, page = filter.page, scope = ?filter.scope, "recipe search");
    let data = summaries(st, recipes).await?;
    Ok(PageResponse::new(data, total, filter.page, filter.limit))
}

pub async fn featured(st: &AppState) -> AppResult<Vec<RecipeSummary>> {
    let (recipes, _) = st.recipes.search(&RecipeFilter::featured()).await?;
    summaries(st, recipes).await
}

pub async fn set_image(
    st: &AppState,
    id: Uuid,
    user_id: Uuid,
    item: UploadItem,
) -> AppResult<RecipeDetails> {
    images::check_type(&item)?;
    let mut recipe = load(st, id).await?;
    recipe.ensure_author(user_id)?;

    let owner = images::recipe_owner(&recipe);
    let key = images::upload(st, &owner, item).await?;
    let old_image = std::mem::replace(&mut recipe.image, key);
    recipe.updated_at = OffsetDateTime::now_utc();
    if let Err(e) = persist(st, &recipe).await {
        images::discard(st, &owner, &recipe.image).await;
        return Err(e);
    }
    images::discard(st, &owner, &old_image).await;

    info!(recipe_id = %id, key = %recipe.image, "recipe image stored");
    details(st, recipe).await
}

pub async fn image_url(st: &AppState, id: Uuid, viewer: Option<Uuid>) -> AppResult<String> {
    let recipe = load_visible(st, id, viewer).await?;
    images::resolve_url(st, &images::recipe_owner(&recipe), &recipe.image)
        .await?
        .ok_or_else(|| AppError::not_found("Image"))
}
