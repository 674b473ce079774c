//! Retrieval-augmented answering: chunking, embedding, a cosine-similarity
//! index over the chunks, and a query engine that synthesizes answers from the
//! retrieved text with the hosted LLM.

pub mod embedder;
pub mod index;
pub mod local_embedder;
pub mod prompts;
pub mod query_engine;
pub mod splitter;

use std::sync::LazyLock;

use thiserror::Error;
use tiktoken_rs::CoreBPE;

use crate::llm_client::LlmError;
use embedder::EmbedderError;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("completion: {0}")]
    Completion(#[from] LlmError),
}

static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    tiktoken_rs::cl100k_base().expect("Failed to initialize cl100k_base tokenizer")
});

/// Token count used for chunking and prompt budgeting (cl100k BPE).
pub fn estimate_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}

/// Cuts `text` down to at most `tokens` tokens.
pub fn truncate_to_tokens(text: &str, tokens: usize) -> String {
    let ids = TOKENIZER.encode_with_special_tokens(text);
    if ids.len() <= tokens {
        return text.to_string();
    }

    // A cut can land inside a multi-byte character; back off until it decodes.
    let mut end = tokens;
    while end > 0 {
        if let Ok(prefix) = TOKENIZER.decode(ids[..end].to_vec()) {
            return prefix;
        }
        end -= 1;
    }
    String::new()
}
