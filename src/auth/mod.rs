use crate::state::AppState;
use axum::Router;

mod claims;
pub mod credentials;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_memory;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
