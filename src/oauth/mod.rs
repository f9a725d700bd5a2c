//! Sign-in through an external identity provider.

use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod identity;
pub mod reconciler;
pub mod verifier;

pub fn router() -> Router<AppState> {
    handlers::oauth_routes()
}
