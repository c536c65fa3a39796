use axum::{
    extract::State,
    routing::{post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        credentials::Registration,
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, PublicUser, RegisterRequest,
            ResetPasswordRequest, ResetTokenResponse, SuccessResponse,
        },
    },
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
    validators::{validate_forgot, validate_login, validate_registration, validate_reset},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/generate-password-token", put(generate_password_token))
        .route("/users/reset-password", put(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    validate_registration(&payload)?;

    let user = state
        .credentials
        .register(Registration {
            first_name: payload.first_name,
            last_name: payload.last_name,
            handle: payload.handle,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let token = state.jwt.issue(user.id)?;

    Ok(Json(AuthResponse {
        user_data: PublicUser::from(user),
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    validate_login(&payload)?;

    let user = state
        .credentials
        .authenticate(&payload.login, &payload.password)
        .await?;
    let token = state.jwt.issue(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        user_data: PublicUser::from(user),
        token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn generate_password_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<ResetTokenResponse>> {
    validate_forgot(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!("reset requested for unknown email");
        return Err(AppError::NotFound("user"));
    };

    let reset_token = state.credentials.issue_reset_token(&user).await?;
    Ok(Json(ResetTokenResponse {
        reset_token,
        success: "Token generated successfully!",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    validate_reset(&payload)?;

    state
        .credentials
        .consume_reset_token(&payload.token, &payload.password)
        .await?;

    Ok(Json(SuccessResponse {
        success: "Password updated successfully!",
    }))
}
