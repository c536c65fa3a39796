use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        DeletedUserResponse, ProfilePicResponse, UpdateUserRequest, UpdatedUserResponse, UserQuery,
        UsersResponse,
    },
    services::{remove_object_for_url, replace_profile_pic, UploadItem},
};
use crate::{
    auth::{dto::PublicUser, extractors::AuthUser, password::hash_password, repo_types::UserChanges},
    campaigns::repo_types::Campaign,
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
    validators::{validate_user_update, FieldErrors},
};

const PROFILE_PIC_LIMIT: usize = 25 * 1024 * 1024;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route(
            "/users/:id/profile-pic",
            put(update_profile_pic).layer(DefaultBodyLimit::max(PROFILE_PIC_LIMIT)),
        )
}

/// Callers may only modify their own record.
fn ensure_self(caller: Uuid, target: Uuid) -> AppResult<()> {
    if caller != target {
        warn!(%caller, %target, "attempt to modify another user");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Query(q): Query<UserQuery>,
) -> AppResult<Json<UsersResponse>> {
    let users = match q.id {
        Some(id) => vec![state
            .users
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("user"))?],
        None => state.users.list().await?,
    };

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let mut by_owner: HashMap<Uuid, Vec<Campaign>> = HashMap::new();
    for campaign in state.campaigns.list_by_owners(&ids).await? {
        by_owner.entry(campaign.created_by).or_default().push(campaign);
    }

    let public: Vec<PublicUser> = users
        .into_iter()
        .map(|u| {
            let campaigns = by_owner.remove(&u.id).unwrap_or_default();
            PublicUser::from(u).with_campaigns(campaigns)
        })
        .collect();

    let response = match q.id {
        Some(_) => UsersResponse::One(
            public
                .into_iter()
                .next()
                .ok_or(AppError::NotFound("user"))?,
        ),
        None => UsersResponse::Many(public),
    };
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> AppResult<Json<UpdatedUserResponse>> {
    ensure_self(caller, id)?;
    validate_user_update(&payload)?;

    let password_hash = payload
        .password
        .as_deref()
        .map(hash_password)
        .transpose()?;
    let changes = UserChanges {
        first_name: payload.first_name.map(|v| v.trim().to_string()),
        last_name: payload.last_name.map(|v| v.trim().to_string()),
        handle: payload.handle.map(|v| v.trim().to_string()),
        email: payload.email.map(|v| v.trim().to_lowercase()),
        password_hash,
    };
    let password_changed = changes.password_hash.is_some();

    let updated = state
        .users
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    info!(user_id = %id, password_changed, "user updated");
    Ok(Json(UpdatedUserResponse {
        updated_user: updated.into(),
        success: "User updated successfully!",
    }))
}

#[instrument(skip(state, mp))]
pub async fn update_profile_pic(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<ProfilePicResponse>> {
    ensure_self(caller, id)?;

    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let mut image = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| FieldErrors::single("file", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| FieldErrors::single("file", e.body_text()))?;
        image = Some(UploadItem { body, content_type });
        break;
    }
    let image = image.ok_or_else(|| FieldErrors::single("file", "Must not be empty!"))?;

    let updated = replace_profile_pic(&state, &user, image).await?;

    info!(user_id = %id, "profile picture updated");
    Ok(Json(ProfilePicResponse {
        user: updated.into(),
        success: "Profile pic updated successfully!",
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeletedUserResponse>> {
    ensure_self(caller, id)?;

    let deleted = state
        .users
        .delete(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    if let Some(url) = deleted.profile_pic.as_deref() {
        remove_object_for_url(&state, url).await;
    }

    info!(user_id = %id, "user deleted");
    Ok(Json(DeletedUserResponse {
        deleted: deleted.into(),
        success: "User deleted successfully!",
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState, storage::MemoryStorage};

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn json_req(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn multipart_req(uri: &str, token: &str, content_type: &str) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"pic\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             fake-image-bytes\r\n\
             --{boundary}--\r\n"
        );
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn register(app: &Router, email: &str, handle: &str) -> (String, String) {
        let (status, body) = send(
            app,
            json_req(
                Method::POST,
                "/users/register",
                None,
                json!({
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "email": email,
                    "handle": handle,
                    "password": "pw1"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (
            body["userData"]["_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_and_tampered_tokens() {
        let app = build_app(AppState::fake());
        let (id, token) = register(&app, "a@x.com", "ax").await;
        let uri = format!("/users/{id}");

        let (status, _) = send(&app, json_req(Method::PUT, &uri, None, json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        let (status, body) = send(
            &app,
            json_req(Method::PUT, &uri, Some(&tampered), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized.");
    }

    #[tokio::test]
    async fn listing_embeds_each_users_campaigns() {
        let app = build_app(AppState::fake());
        let (id_a, token_a) = register(&app, "a@x.com", "ax").await;
        let (id_b, _) = register(&app, "b@x.com", "bx").await;

        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                "/campaigns",
                Some(&token_a),
                json!({ "name": "Storm King's Thunder" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, users) = send(
            &app,
            json_req(Method::GET, "/users", Some(&token_a), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let users = users.as_array().unwrap();
        assert_eq!(users.len(), 2);
        let a = users.iter().find(|u| u["_id"] == id_a.as_str()).unwrap();
        let b = users.iter().find(|u| u["_id"] == id_b.as_str()).unwrap();
        assert_eq!(a["campaigns"][0]["name"], "Storm King's Thunder");
        assert_eq!(b["campaigns"], json!([]));
        assert!(a.get("passwordHash").is_none());

        let (status, one) = send(
            &app,
            json_req(Method::GET, &format!("/users?id={id_a}"), Some(&token_a), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(one["handle"], "ax");
        assert_eq!(one["campaigns"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            json_req(
                Method::GET,
                &format!("/users?id={}", uuid::Uuid::new_v4()),
                Some(&token_a),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn users_may_only_modify_themselves() {
        let app = build_app(AppState::fake());
        let (_, token_a) = register(&app, "a@x.com", "ax").await;
        let (id_b, _) = register(&app, "b@x.com", "bx").await;

        let uri = format!("/users/{id_b}");
        let (status, _) = send(
            &app,
            json_req(Method::PUT, &uri, Some(&token_a), json!({ "firstName": "Mallory" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, json_req(Method::DELETE, &uri, Some(&token_a), json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn password_change_via_update_takes_effect() {
        let app = build_app(AppState::fake());
        let (id, token) = register(&app, "a@x.com", "ax").await;

        let (status, body) = send(
            &app,
            json_req(
                Method::PUT,
                &format!("/users/{id}"),
                Some(&token),
                json!({ "password": "pw2", "lastName": "Byron" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updatedUser"]["lastName"], "Byron");

        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                "/users/login",
                None,
                json!({ "login": "ax", "password": "pw1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                "/users/login",
                None,
                json!({ "login": "ax", "password": "pw2" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_cannot_steal_another_handle() {
        let app = build_app(AppState::fake());
        let (id, token) = register(&app, "a@x.com", "ax").await;
        register(&app, "b@x.com", "bx").await;

        let (status, body) = send(
            &app,
            json_req(
                Method::PUT,
                &format!("/users/{id}"),
                Some(&token),
                json!({ "handle": "bx" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["handle"], "Handle already in use.");
    }

    #[tokio::test]
    async fn profile_pic_upload_replaces_previous_object() {
        let storage = Arc::new(MemoryStorage::new("https://fake.local"));
        let app = build_app(AppState::fake_with_storage(storage.clone()));
        let (id, token) = register(&app, "a@x.com", "ax").await;
        let uri = format!("/users/{id}/profile-pic");

        let (status, body) = send(&app, multipart_req(&uri, &token, "image/png")).await;
        assert_eq!(status, StatusCode::OK);
        let first_url = body["user"]["profilePic"].as_str().unwrap().to_string();
        assert!(first_url.starts_with(&format!("https://fake.local/profile-pics/{id}/")));
        assert!(first_url.ends_with(".png"));
        assert_eq!(storage.keys().await.len(), 1);

        let (status, body) = send(&app, multipart_req(&uri, &token, "image/jpeg")).await;
        assert_eq!(status, StatusCode::OK);
        let second_url = body["user"]["profilePic"].as_str().unwrap();
        assert_ne!(second_url, first_url);

        let keys = storage.keys().await;
        assert_eq!(keys.len(), 1);
        assert!(second_url.ends_with(&keys[0]));
    }

    #[tokio::test]
    async fn profile_pic_rejects_non_images() {
        let storage = Arc::new(MemoryStorage::new("https://fake.local"));
        let app = build_app(AppState::fake_with_storage(storage.clone()));
        let (id, token) = register(&app, "a@x.com", "ax").await;

        let (status, body) = send(
            &app,
            multipart_req(&format!("/users/{id}/profile-pic"), &token, "application/pdf"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["file"], "Unsupported file format.");
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_account_and_picture() {
        let storage = Arc::new(MemoryStorage::new("https://fake.local"));
        let app = build_app(AppState::fake_with_storage(storage.clone()));
        let (id, token) = register(&app, "a@x.com", "ax").await;
        send(
            &app,
            multipart_req(&format!("/users/{id}/profile-pic"), &token, "image/png"),
        )
        .await;

        let (status, body) = send(
            &app,
            json_req(Method::DELETE, &format!("/users/{id}"), Some(&token), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"]["_id"], id.as_str());
        assert!(storage.keys().await.is_empty());

        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                "/users/login",
                None,
                json!({ "login": "ax", "password": "pw1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
