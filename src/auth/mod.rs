use crate::state::AppState;
use axum::Router;

pub mod authorize;
mod dto;
pub mod envelope;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod reset;
pub mod service;
pub mod store;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
