use axum::{
    extract::{FromRef, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{OAuthLoginRequest, OAuthLoginResponse, OAuthUserData},
    identity::SupplementalProfile,
    reconciler::{IdentityReconciler, ReconcileError},
    verifier::VerifyError,
};
use crate::{
    accounts::AuthProvider,
    auth::cookie::session_cookie,
    error::ApiError,
    forms::JsonBody,
    state::AppState,
    validation::{self, ValidationError},
};

pub fn oauth_routes() -> Router<AppState> {
    Router::new().route("/auth/oauth/login", post(oauth_login))
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::AccountNotFound => {
                ApiError::not_found("User not found. Please create a new account.")
                    .with_body(|b| b.requires_new_account = Some(true))
            }
            ReconcileError::ConflictRequiresPassword { email } => ApiError::conflict(format!(
                "Email {email} is already registered with a password. Please use your password to sign in."
            ))
            .with_body(|b| {
                b.requires_password = Some(true);
                b.email = Some(email);
            }),
            ReconcileError::ConflictDifferentProvider { email, existing } => {
                ApiError::conflict(format!(
                    "Email {email} is already associated with a {existing} account. Please use {existing} to sign in."
                ))
                .with_body(|b| b.existing_provider = Some(existing))
            }
            ReconcileError::VerificationFailed(VerifyError::UnsupportedProvider(p)) => {
                ApiError::bad_request(format!("Unsupported auth provider: {p}"))
            }
            ReconcileError::VerificationFailed(e) => {
                warn!(error = %e, "oauth verification failed");
                ApiError::unauthorized("Invalid OAuth token")
            }
            ReconcileError::ConcurrentWrite => {
                ApiError::conflict("Account was modified concurrently. Please try again.")
                    .with_body(|b| b.retryable = Some(true))
            }
            ReconcileError::StoreUnavailable(e) => ApiError::internal(e),
            ReconcileError::Session(e) => ApiError::internal(e),
        }
    }
}

/// Validated form of the optional `userData` block.
fn supplemental(data: OAuthUserData) -> Result<SupplementalProfile, ValidationError> {
    let name = match data.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => Some(validation::name(n)?),
        _ => None,
    };
    let age = data.age.map(validation::age).transpose()?;
    let gender = match data.gender.as_deref().map(str::trim) {
        Some(g) if !g.is_empty() => Some(validation::gender(g)?),
        _ => None,
    };
    Ok(SupplementalProfile { name, age, gender })
}

#[instrument(skip(state, payload), fields(provider = %payload.provider))]
pub async fn oauth_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<OAuthLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let provider: AuthProvider = payload.provider.parse().map_err(|_| {
        ApiError::bad_request(format!("Unsupported auth provider: {}", payload.provider))
    })?;
    if payload.access_token.trim().is_empty() {
        return Err(ApiError::bad_request("Access token is required"));
    }
    let profile = payload.user_data.map(supplemental).transpose()?;

    let login = IdentityReconciler::from_ref(&state)
        .login(provider, payload.access_token.trim(), profile)
        .await?;

    let cookie =
        session_cookie(&login.token, state.config.production).map_err(ApiError::internal)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(OAuthLoginResponse {
            message: "OAuth login successful",
            user: login.account.into(),
            is_new_user: login.is_new_account,
        }),
    ))
}
