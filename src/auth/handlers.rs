use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, ProfileUpdate, RefreshRequest,
            RegisterRequest,
        },
        jwt::{AuthUser, JwtKeys},
        services,
    },
    error::AppResult,
    form::JsonOrMultipart,
    images::MAX_IMAGE_BYTES,
    response::{ApiResponse, MessageResponse},
    state::AppState,
    users::model::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(get_me))
        .route(
            "/auth/profile",
            put(update_profile).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/auth/change-password", post(change_password))
}

#[instrument(skip(state, keys, payload))]
pub async fn register(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let Json(payload) = payload?;
    let res = services::register(&state, &keys, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(res))))
}

#[instrument(skip(state, keys, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let Json(payload) = payload?;
    let res = services::login(&state, &keys, payload).await?;
    Ok(Json(ApiResponse::ok(res)))
}

#[instrument(skip(state, keys, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let Json(payload) = payload?;
    let res = services::refresh(&state, &keys, &payload.refresh_token).await?;
    Ok(Json(ApiResponse::ok(res)))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = services::me(&state, user_id).await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// PUT /auth/profile (JSON, or multipart with `data` and an `avatar` file)
#[instrument(skip(state, body))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut body: JsonOrMultipart<ProfileUpdate>,
) -> AppResult<Json<ApiResponse<User>>> {
    let avatar = body.take_file("avatar");
    let user = services::update_profile(&state, user_id, body.data, avatar).await?;
    Ok(Json(ApiResponse::ok(user)))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(payload) = payload?;
    services::change_password(&state, user_id, payload).await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}
