use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One completed exchange, as the client replays it with each request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub human: String,
    pub assistant: String,
}

/// JSON payload carried in the `data` form field of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// A file part read from a multipart form, not yet written to disk.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub file_name: String,
    pub bytes: Bytes,
}
