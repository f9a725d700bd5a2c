use axum::{
    extract::{Multipart, Path, Query, State},
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        DeleteResponse, DeletedUser, ListQuery, Pagination, ProfileResponse, UserListResponse,
        UserResponse,
    },
    services::{self, UserError},
};
use crate::{
    accounts::PublicAccount, auth::cookie::clear_session_cookie, auth::extractors::AuthUser,
    error::ApiError, forms::ProfileForm, state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/profile", put(update_profile))
        .route("/users/:id", get(get_user).delete(delete_user))
}

/// Ids that are not UUIDs cannot name an account.
fn parse_id(raw: &str) -> Result<Uuid, UserError> {
    raw.parse().map_err(|_| UserError::NotFound)
}

#[instrument(skip(state, account, multipart), fields(account_id = %account.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    multipart: Multipart,
) -> Result<Json<ProfileResponse>, ApiError> {
    let mut form = ProfileForm::read(multipart).await?;
    let profile = form.profile()?;

    let updated = services::update_profile(
        state.accounts.as_ref(),
        state.storage.as_ref(),
        state.config.storage.timeout(),
        &account,
        profile,
        form.picture.take(),
    )
    .await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully",
        user: updated.into(),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let (page, limit) = services::page_bounds(query.page(), query.limit());
    let listing = services::list_accounts(state.accounts.as_ref(), page, limit).await?;
    let total_pages = listing.total_pages();

    Ok(Json(UserListResponse {
        pagination: Pagination {
            current_page: listing.page,
            total_pages,
            total_count: listing.total_count,
            has_next_page: listing.page < total_pages,
            has_prev_page: listing.page > 1,
        },
        users: listing
            .accounts
            .into_iter()
            .map(PublicAccount::summary)
            .collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let account = services::get_account(state.accounts.as_ref(), parse_id(&id)?).await?;
    Ok(Json(UserResponse {
        user: PublicAccount::summary(account),
    }))
}

#[instrument(skip(state, account), fields(account_id = %account.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(account): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let target = parse_id(&id).map_err(|_| UserError::Forbidden)?;
    let deleted = services::delete_account(
        state.accounts.as_ref(),
        state.storage.as_ref(),
        state.config.storage.timeout(),
        &account,
        target,
    )
    .await?;

    Ok((
        [(SET_COOKIE, clear_session_cookie(state.config.production))],
        Json(DeleteResponse {
            message: "User deleted successfully",
            deleted_user: DeletedUser {
                id: deleted.id,
                oauth_provider: deleted.auth_provider,
            },
        }),
    ))
}
