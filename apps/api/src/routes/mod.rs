pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::ats::handlers as ats;
use crate::chat::handlers as chat;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/", get(health::welcome_handler))
        .route("/health", get(health::health_handler))
        // Chat API
        .route("/chat", post(chat::handle_chat))
        .route("/new_chat", post(chat::handle_new_chat))
        .route("/documents", get(chat::handle_list_documents))
        // ATS API
        .route("/ats_score", post(ats::handle_ats_score))
        .layer(body_limit)
        .with_state(state)
}
