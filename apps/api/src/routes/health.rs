use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// GET /
pub async fn welcome_handler() -> &'static str {
    "Welcome to the Chat API!"
}

/// GET /health
/// Returns a simple status object with service version and loaded documents.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let documents: Vec<String> = {
        let store = state.store.read().await;
        store.file_names().into_iter().map(str::to_string).collect()
    };
    let uploaded_files = match state.uploads.list().await {
        Ok(files) => files.len(),
        Err(e) => {
            warn!("Could not list upload directory: {e}");
            0
        }
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-chat-api",
        "model": state.llm.model_name(),
        "embedder": state.embedder.model_name(),
        "documents": documents,
        "uploaded_files": uploaded_files,
    }))
}
