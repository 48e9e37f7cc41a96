use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::recipes::model::Recipe;
use crate::state::AppState;

const RECIPE_PREFIX: &str = "recipes/";
const AVATAR_PREFIX: &str = "avatars/";
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub(crate) fn check_type(item: &UploadItem) -> AppResult<()> {
    match ext_from_mime(&item.content_type) {
        Some(_) => Ok(()),
        None => Err(AppError::validation("Only image files are allowed")),
    }
}

/// Every object a recipe may own starts with this.
pub(crate) fn recipe_owner(recipe: &Recipe) -> String {
    format!("{RECIPE_PREFIX}{}/{}-", recipe.author_id, recipe.id)
}

pub(crate) fn avatar_owner(user_id: Uuid) -> String {
    format!("{AVATAR_PREFIX}{user_id}/")
}

fn object_key(owner: &str, ext: &str) -> String {
    format!("{owner}{}.{ext}", Uuid::new_v4())
}

/// Images we stored ourselves, as opposed to external URLs pasted by the author.
pub(crate) fn is_object_key(image: &str) -> bool {
    image.starts_with(RECIPE_PREFIX) || image.starts_with(AVATAR_PREFIX)
}

/// Stores the upload under `owner` and returns its object key. Callers check
/// the MIME type.
pub async fn upload(st: &AppState, owner: &str, item: UploadItem) -> anyhow::Result<String> {
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = object_key(owner, ext);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;
    Ok(key)
}

/// Where a browser should fetch the image from, if there is one. Keys outside
/// `owner` are never presigned.
pub async fn resolve_url(
    st: &AppState,
    owner: &str,
    image: &str,
) -> anyhow::Result<Option<String>> {
    if image.is_empty() {
        return Ok(None);
    }
    if !is_object_key(image) {
        return Ok(Some(image.to_string()));
    }
    if !image.starts_with(owner) {
        warn!(key = %image, owner = %owner, "refusing to resolve foreign object key");
        return Ok(None);
    }
    let url = st
        .storage
        .presign_get(image, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {image}"))?;
    Ok(Some(url))
}

/// Best effort; a dangling object is not worth failing the request over.
/// Only objects under `owner` are deleted.
pub async fn discard(st: &AppState, owner: &str, image: &str) {
    if !image.starts_with(owner) {
        return;
    }
    if let Err(e) = st.storage.delete_object(image).await {
        warn!(error = %e, key = %image, "failed to delete stored image");
    }
}
