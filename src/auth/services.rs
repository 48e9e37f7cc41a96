use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest},
        jwt::JwtKeys,
        password::{self, check_new_password, hash_password, verify_password},
    },
    error::{AppError, AppResult},
    images::{self, UploadItem},
    state::AppState,
    users::{model::User, services as user_services},
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,30}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

fn issue_tokens(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user,
    })
}

pub async fn register(
    state: &AppState,
    keys: &JwtKeys,
    mut req: RegisterRequest,
) -> AppResult<AuthResponse> {
    req.email = req.email.trim().to_lowercase();
    req.username = req.username.trim().to_string();

    if !is_valid_username(&req.username) {
        return Err(AppError::validation(
            "Username must be 3-30 letters, digits or underscores",
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::validation("Invalid email"));
    }
    check_new_password(&req.password)?;
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::validation("First and last name are required"));
    }

    if state.users.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if state.users.find_by_username(&req.username).await?.is_some() {
        warn!(username = %req.username, "username taken");
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = User::new(req.username, req.email, hash, first_name, last_name);
    state.users.insert(&user).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    issue_tokens(keys, user)
}

pub async fn login(
    state: &AppState,
    keys: &JwtKeys,
    mut req: LoginRequest,
) -> AppResult<AuthResponse> {
    req.email = req.email.trim().to_lowercase();
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = state.users.find_by_email(&req.email).await? else {
        warn!(email = %req.email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue_tokens(keys, user)
}

pub async fn refresh(state: &AppState, keys: &JwtKeys, token: &str) -> AppResult<AuthResponse> {
    let claims = keys
        .verify_refresh(token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    let user = state
        .users
        .find(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    issue_tokens(keys, user)
}

pub async fn me(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let user = state
        .users
        .find(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    user_services::presented(state, user).await
}

/// Name and bio changes plus an optional new avatar, saved together.
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    update: ProfileUpdate,
    avatar: Option<UploadItem>,
) -> AppResult<User> {
    if let Some(item) = &avatar {
        images::check_type(item)?;
    }
    let mut user = user_services::load(state, user_id).await?;
    user.update_profile(update.first_name, update.last_name, update.bio)?;

    let owner = images::avatar_owner(user.id);
    let old_avatar = user.avatar.clone();
    if let Some(item) = avatar {
        user.avatar = images::upload(state, &owner, item).await?;
    }
    if let Err(e) = user_services::persist(state, &user).await {
        if user.avatar != old_avatar {
            images::discard(state, &owner, &user.avatar).await;
        }
        return Err(e);
    }
    if user.avatar != old_avatar {
        images::discard(state, &owner, &old_avatar).await;
    }

    info!(user_id = %user.id, "profile updated");
    user_services::presented(state, user).await
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> AppResult<()> {
    let mut user = user_services::load(state, user_id).await?;
    password::change_password(&mut user, &req.current_password, &req.new_password)?;
    user_services::persist(state, &user).await
}
