use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppResult,
    recipes::{dto::RecipeSummary, query::SearchParams},
    response::{ApiResponse, PageResponse},
    state::AppState,
    users::{
        dto::{FollowState, ProfileResponse, TopChef},
        services,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/top-chefs", get(top_chefs))
        .route("/users/profile/:username", get(get_profile))
        .route("/users/:user/recipes", get(user_recipes))
        .route("/users/:user/favorites", get(user_favorites))
        .route("/users/:user/avatar", get(get_avatar)) // user id; 302 to the image
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/my-recipes", get(my_recipes))
        .route("/users/favorites", get(my_favorites))
        .route("/users/:user/follow", post(follow).delete(unfollow))
}

#[instrument(skip(state))]
pub async fn my_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PageResponse<RecipeSummary>>> {
    Ok(Json(services::my_recipes(&state, user_id, params).await?))
}

#[instrument(skip(state))]
pub async fn my_favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PageResponse<RecipeSummary>>> {
    Ok(Json(services::favorites(&state, user_id, params).await?))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<ApiResponse<ProfileResponse>>> {
    Ok(Json(ApiResponse::ok(
        services::profile(&state, &username).await?,
    )))
}

#[instrument(skip(state))]
pub async fn user_recipes(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PageResponse<RecipeSummary>>> {
    Ok(Json(services::recipes_of(&state, &username, params).await?))
}

#[instrument(skip(state))]
pub async fn user_favorites(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PageResponse<RecipeSummary>>> {
    Ok(Json(
        services::public_favorites(&state, &username, params).await?,
    ))
}

#[instrument(skip(state))]
pub async fn top_chefs(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<TopChef>>>> {
    Ok(Json(ApiResponse::ok(services::top_chefs(&state).await?)))
}

#[instrument(skip(state))]
pub async fn get_avatar(
    State(state): State<AppState>,
    target: Result<Path<Uuid>, PathRejection>,
) -> AppResult<(StatusCode, [(HeaderName, String); 1])> {
    let Path(target) = target?;
    let url = services::avatar_redirect(&state, target).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    target: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<FollowState>>> {
    let Path(target) = target?;
    Ok(Json(ApiResponse::ok(
        services::follow(&state, user_id, target).await?,
    )))
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    target: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<FollowState>>> {
    let Path(target) = target?;
    Ok(Json(ApiResponse::ok(
        services::unfollow(&state, user_id, target).await?,
    )))
}
