use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::chat::models::{ChatRequest, ChatResponse, UploadedPart};
use crate::chat::orchestrator::{run_chat_turn, ChatTurn};
use crate::documents::store::DocumentSummary;
use crate::errors::AppError;
use crate::state::AppState;

pub const CLEARED_MESSAGE: &str = "Chat history and document store cleared.";

/// Raw `POST /chat` form, before validation.
#[derive(Debug, Default)]
pub struct ChatForm {
    pub data: Option<String>,
    pub file: Option<UploadedPart>,
    /// `file_<n>` parts keyed by `n`.
    pub indexed_files: Vec<(usize, UploadedPart)>,
}

impl ChatForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ChatForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "data" {
                form.data = Some(field.text().await?);
                continue;
            }

            let slot = match name.as_str() {
                "file" => None,
                other => match other.strip_prefix("file_").and_then(|n| n.parse::<usize>().ok()) {
                    Some(n) => Some(n),
                    None => {
                        warn!("Ignoring unexpected form field {name:?}");
                        continue;
                    }
                },
            };

            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            if file_name.is_empty() {
                continue;
            }

            let part = UploadedPart { file_name, bytes };
            match slot {
                None => form.file = Some(part),
                Some(n) => form.indexed_files.push((n, part)),
            }
        }

        form.indexed_files.sort_by_key(|(n, _)| *n);
        Ok(form)
    }

    /// Files this turn should index. Numbered parts win over `file`, and
    /// `file` only counts on the first turn of a conversation.
    pub fn into_uploads(self, history_is_empty: bool) -> Vec<UploadedPart> {
        if !self.indexed_files.is_empty() {
            return self.indexed_files.into_iter().map(|(_, p)| p).collect();
        }
        match self.file {
            Some(part) if history_is_empty => vec![part],
            _ => vec![],
        }
    }
}

/// POST /chat
pub async fn handle_chat(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ChatResponse>, AppError> {
    let mut form = ChatForm::read(multipart).await?;
    let data = form
        .data
        .take()
        .ok_or_else(|| AppError::Validation("Missing 'data' form field".to_string()))?;

    let request: ChatRequest = serde_json::from_str(&data)?;
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("No message provided".to_string()));
    }

    let parts = form.into_uploads(request.chat_history.is_empty());
    let mut uploads = Vec::with_capacity(parts.len());
    for part in parts {
        let stored = state.uploads.save(&part.file_name, &part.bytes).await?;
        info!(
            "Saved upload {} as {} ({} bytes)",
            stored.display_name, stored.stored_name, stored.size_bytes
        );
        uploads.push(stored);
    }

    let response = run_chat_turn(
        &state,
        ChatTurn {
            message: request.message,
            history: request.chat_history,
            uploads,
        },
    )
    .await?;

    Ok(Json(ChatResponse { response }))
}

/// POST /new_chat
pub async fn handle_new_chat(
    State(state): State<AppState>,
) -> Result<Json<ChatResponse>, AppError> {
    state.store.write().await.reset();
    let removed = state.uploads.clear().await?;
    info!("Started a new chat, removed {removed} uploaded files");

    Ok(Json(ChatResponse {
        response: CLEARED_MESSAGE.to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub combined: bool,
}

/// GET /documents
pub async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let store = state.store.read().await;
    Json(DocumentListResponse {
        documents: store.summaries(),
        combined: store.has_combined_index(),
    })
}
