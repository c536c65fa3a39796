use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    state::AppState,
    validators::FieldErrors,
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn profile_pic_key(user_id: Uuid, content_type: &str) -> String {
    let ext = ext_from_mime(content_type).unwrap_or("img");
    format!("profile-pics/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

/// Stores the image and points the user's `profile_pic` at it. The previous
/// picture is removed afterwards; failing to remove it is only logged.
pub async fn replace_profile_pic(
    st: &AppState,
    user: &User,
    image: UploadItem,
) -> AppResult<User> {
    if !image.content_type.starts_with("image/") {
        return Err(FieldErrors::single("file", "Unsupported file format.").into());
    }

    let key = profile_pic_key(user.id, &image.content_type);
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let url = st.storage.public_url(&key);
    let Some(updated) = st.users.set_profile_pic(user.id, &url).await? else {
        // The user vanished mid-upload; don't leave an orphan behind.
        remove_object_for_url(st, &url).await;
        return Err(AppError::NotFound("user"));
    };

    if let Some(old) = user.profile_pic.as_deref() {
        remove_object_for_url(st, old).await;
    }
    Ok(updated)
}

pub async fn remove_object_for_url(st: &AppState, url: &str) {
    let Some(key) = st.storage.key_from_url(url) else {
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "failed to delete stored object");
    }
}
