use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::post_routes()
}
