use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderName, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    form::JsonOrMultipart,
    images::{UploadItem, MAX_IMAGE_BYTES},
    recipes::{
        dto::{FavoriteState, LikeState, RecipeDetails, RecipeSummary, ReviewRequest},
        model::RecipeInput,
        query::{RecipeFilter, Scope, SearchParams},
        services,
    },
    response::{ApiResponse, MessageResponse, PageResponse},
    state::AppState,
    users,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/featured", get(featured_recipes))
        .route("/recipes/:id", get(get_recipe))
        .route("/recipes/:id/image", get(get_image)) // 302 to the stored or external image
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/:id",
            put(update_recipe)
                .delete(delete_recipe)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/recipes/:id/like", post(toggle_like))
        .route("/recipes/:id/reviews", post(add_review))
        .route("/recipes/:id/favorite", post(toggle_favorite))
        .route("/recipes/:id/instructions/:index", delete(remove_instruction))
        .route(
            "/recipes/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<PageResponse<RecipeSummary>>> {
    let filter = RecipeFilter::from_params(Scope::Public, params)?;
    Ok(Json(services::search(&state, &filter).await?))
}

#[instrument(skip(state))]
pub async fn featured_recipes(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<RecipeSummary>>>> {
    Ok(Json(ApiResponse::ok(services::featured(&state).await?)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let Path(id) = id?;
    let recipe = services::get_recipe(&state, id, viewer).await?;
    Ok(Json(ApiResponse::ok(recipe)))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<RecipeInput>, JsonRejection>,
) -> AppResult<(
    StatusCode,
    [(HeaderName, String); 1],
    Json<ApiResponse<RecipeDetails>>,
)> {
    let Json(input) = body?;
    let recipe = services::create_recipe(&state, user_id, input).await?;
    let location = format!("/api/recipes/{}", recipe.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ApiResponse::ok(recipe)),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    mut body: JsonOrMultipart<RecipeInput>,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let Path(id) = id?;
    let image = body.take_file("image");
    let recipe = services::update_recipe(&state, id, user_id, body.data, image).await?;
    Ok(Json(ApiResponse::ok(recipe)))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id?;
    services::delete_recipe(&state, id, user_id).await?;
    Ok(Json(MessageResponse::ok("Recipe deleted successfully")))
}

#[instrument(skip(state))]
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<LikeState>>> {
    let Path(id) = id?;
    let like = services::toggle_like(&state, id, user_id).await?;
    Ok(Json(ApiResponse::ok(like)))
}

#[instrument(skip(state, body))]
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let Path(id) = id?;
    let Json(req) = body?;
    let recipe = services::add_review(&state, id, user_id, req).await?;
    Ok(Json(ApiResponse::ok(recipe)))
}

#[instrument(skip(state))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ApiResponse<FavoriteState>>> {
    let Path(id) = id?;
    let fav = users::services::toggle_favorite(&state, user_id, id).await?;
    Ok(Json(ApiResponse::ok(fav)))
}

#[instrument(skip(state))]
pub async fn remove_instruction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<(Uuid, usize)>, PathRejection>,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let Path((id, index)) = path?;
    let recipe = services::remove_instruction(&state, id, user_id, index).await?;
    Ok(Json(ApiResponse::ok(recipe)))
}

/// POST /recipes/:id/image (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    mut mp: Multipart,
) -> AppResult<Json<ApiResponse<RecipeDetails>>> {
    let Path(id) = id?;
    let mut upload = None;
    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "bad multipart body");
        AppError::validation(e.body_text())
    })? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        upload = Some(UploadItem { body, content_type });
        break;
    }
    let item = upload.ok_or_else(|| AppError::validation("image is required"))?;

    let recipe = services::set_image(&state, id, user_id, item).await?;
    Ok(Json(ApiResponse::ok(recipe)))
}

#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<(StatusCode, [(HeaderName, String); 1])> {
    let Path(id) = id?;
    let url = services::image_url(&state, id, viewer).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}
