use axum::{
    extract::{FromRef, Multipart, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use super::{
    cookie::{clear_session_cookie, session_cookie},
    dto::{AuthResponse, LoginRequest, MeResponse, MessageResponse, ResetPasswordRequest},
    extractors::AuthUser,
    jwt::JwtKeys,
    services,
};
use crate::{
    accounts::Account,
    error::ApiError,
    forms::{JsonBody, ProfileForm},
    images::{delete_avatar, upload_avatar},
    state::AppState,
    validation,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/reset-password", post(reset_password))
}

/// Signs a session for the account and renders `{message, user}` with the cookie set.
pub(crate) fn session_response(
    state: &AppState,
    status: StatusCode,
    message: &'static str,
    account: Account,
) -> Result<impl IntoResponse, ApiError> {
    let token = JwtKeys::from_ref(state)
        .sign(account.id, &account.email)
        .map_err(ApiError::internal)?;
    let cookie = session_cookie(&token, state.config.production).map_err(ApiError::internal)?;
    Ok((
        status,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            message,
            user: account.into(),
        }),
    ))
}

#[instrument(skip(state, multipart))]
pub async fn signup(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = ProfileForm::read(multipart).await?;

    let email = validation::email(form.get("email").unwrap_or_default())?;
    let password = form.get("password").unwrap_or_default().to_string();
    validation::new_password(&password)?;
    let profile = form.profile()?;

    services::ensure_email_available(state.accounts.as_ref(), &email).await?;

    let avatar_url = match form.picture.take() {
        Some(item) => Some(
            upload_avatar(state.storage.as_ref(), item, state.config.storage.timeout())
                .await
                .map_err(|e| {
                    error!(error = %e, "avatar upload failed");
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to upload profile picture. Please try again.",
                    )
                })?,
        ),
        None => None,
    };

    let registered = services::register(
        state.accounts.as_ref(),
        email,
        &password,
        profile,
        avatar_url.clone(),
    )
    .await;
    let account = match registered {
        Ok(account) => account,
        Err(e) => {
            if let Some(url) = avatar_url.as_deref() {
                delete_avatar(state.storage.as_ref(), url, state.config.storage.timeout()).await;
            }
            return Err(e.into());
        }
    };
    session_response(&state, StatusCode::CREATED, "User created successfully", account)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validation::email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    let account = services::authenticate(state.accounts.as_ref(), &email, &payload.password).await?;
    session_response(&state, StatusCode::OK, "Login successful", account)
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, clear_session_cookie(state.config.production))],
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

#[instrument(skip_all)]
pub async fn me(AuthUser(account): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: account.into(),
    })
}

#[instrument(skip(state, account, payload), fields(account_id = %account.id))]
pub async fn reset_password(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::bad_request(
            "Current password and new password are required",
        ));
    }
    validation::new_password(&payload.new_password)?;

    services::change_password(
        state.accounts.as_ref(),
        account.id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;

    info!(account_id = %account.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}
