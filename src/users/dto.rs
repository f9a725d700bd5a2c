use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{AuthProvider, PublicAccount};

/// Raw query for the listing; unparsable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> Option<i64> {
        self.page.as_deref().and_then(|v| v.trim().parse().ok())
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicAccount>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicAccount,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: &'static str,
    pub user: PublicAccount,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUser {
    pub id: Uuid,
    pub oauth_provider: Option<AuthProvider>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: &'static str,
    pub deleted_user: DeletedUser,
}
