//! Uploaded files, their extracted text, and the process-wide store that
//! tracks which indices are currently live.

pub mod loader;
pub mod store;
pub mod uploads;

use serde::Serialize;
use uuid::Uuid;

/// Extracted text of one uploaded file, tagged with the name shown to users.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub file_name: String,
}

impl Document {
    pub fn new(text: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            file_name: file_name.into(),
        }
    }
}
