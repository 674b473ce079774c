//! Chat turn orchestration: decides which index answers a turn and how the
//! prompt is shaped, then hands off to the query engine.
//!
//! Flow per turn:
//! - several uploads → index each file, merge into a combined index, answer
//!   with tree-summarize over every resume using the comparison prompt.
//! - one upload → index it alone and answer with the plain prompt.
//! - no upload → keep answering from whatever index is active (an empty one
//!   before anything was uploaded).
//!
//! Indices are built without holding the store lock; the lock only guards the
//! swap and the snapshot of the active engine.

use std::sync::Arc;

use tracing::info;

use crate::chat::models::ChatMessage;
use crate::chat::prompts::{comparison_prompt, history_context, wrap_turn};
use crate::documents::loader::load_document;
use crate::documents::store::{ActiveEngine, IndexedFile};
use crate::documents::uploads::StoredFile;
use crate::errors::AppError;
use crate::retrieval::index::VectorIndex;
use crate::retrieval::query_engine::QueryEngine;
use crate::state::AppState;

/// Everything a chat turn needs once the request has been validated and the
/// uploads are on disk.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub uploads: Vec<StoredFile>,
}

pub async fn run_chat_turn(state: &AppState, turn: ChatTurn) -> Result<String, AppError> {
    let context = history_context(&turn.history);

    let (engine, full_query) = match turn.uploads.len() {
        0 => {
            let engine = state.store.write().await.active_or_empty();
            (engine, wrap_turn(&context, &turn.message))
        }
        1 => {
            let engine = activate_single(state, &turn.uploads[0]).await?;
            (engine, wrap_turn(&context, &turn.message))
        }
        _ => {
            let engine = activate_many(state, &turn.uploads).await?;
            let names: Vec<String> = turn
                .uploads
                .iter()
                .map(|f| f.display_name.clone())
                .collect();
            let prompt = comparison_prompt(&turn.message, &names);
            (engine, wrap_turn(&context, &prompt))
        }
    };

    info!(
        "Answering chat turn (mode={:?}, nodes={}, history={})",
        engine.mode,
        engine.index.len(),
        turn.history.len()
    );

    let answer = QueryEngine::new(
        &engine.index,
        state.embedder.as_ref(),
        state.llm.as_ref(),
        &state.query_settings,
        engine.mode,
    )
    .per_source(engine.per_source)
    .query(&full_query)
    .await?;

    Ok(answer)
}

async fn index_file(state: &AppState, file: &StoredFile) -> Result<IndexedFile, AppError> {
    let documents = load_document(file).await?;
    let index =
        VectorIndex::from_documents(&documents, &state.splitter, state.embedder.as_ref()).await?;

    info!(
        "Indexed {} ({} nodes)",
        file.display_name,
        index.len()
    );

    Ok(IndexedFile {
        display_name: file.display_name.clone(),
        documents,
        index: Arc::new(index),
    })
}

async fn activate_single(state: &AppState, file: &StoredFile) -> Result<ActiveEngine, AppError> {
    let indexed = index_file(state, file).await?;
    Ok(state.store.write().await.install_single(indexed))
}

async fn activate_many(state: &AppState, files: &[StoredFile]) -> Result<ActiveEngine, AppError> {
    let mut indexed = Vec::with_capacity(files.len());
    for file in files {
        indexed.push(index_file(state, file).await?);
    }

    let combined = Arc::new(VectorIndex::merge(indexed.iter().map(|f| &f.index)));
    info!(
        "Built combined index over {} files, nodes per file: {:?}",
        indexed.len(),
        combined.source_counts()
    );

    Ok(state.store.write().await.install_many(indexed, combined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::RecordingModel;
    use crate::retrieval::embedder::{Embedder, EmbedderError};
    use crate::retrieval::query_engine::{ResponseMode, EMPTY_RESPONSE};

    async fn test_state(dir: &std::path::Path, llm: Arc<RecordingModel>) -> AppState {
        AppState::for_tests(dir, llm).await
    }

    fn turn(message: &str, uploads: Vec<StoredFile>) -> ChatTurn {
        ChatTurn {
            message: message.to_string(),
            history: vec![],
            uploads,
        }
    }

    #[tokio::test]
    async fn test_no_uploads_answers_from_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("unused"));
        let state = test_state(tmp.path(), llm.clone()).await;

        let answer = run_chat_turn(&state, turn("Hello?", vec![])).await.unwrap();

        assert_eq!(answer, EMPTY_RESPONSE);
        assert!(llm.prompts().is_empty());
        assert!(state.store.read().await.active().is_some());
    }

    #[tokio::test]
    async fn test_single_upload_builds_one_index_from_that_document() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("She knows Haskell."));
        let state = test_state(tmp.path(), llm.clone()).await;
        let file = state
            .uploads
            .save("jane.txt", b"Jane Doe. Functional programmer fluent in Haskell.")
            .await
            .unwrap();

        let answer = run_chat_turn(&state, turn("What languages does Jane know?", vec![file]))
            .await
            .unwrap();

        assert_eq!(answer, "She knows Haskell.");
        let store = state.store.read().await;
        assert_eq!(store.index_count(), 1);
        assert_eq!(store.file_names(), vec!["jane.txt"]);
        assert_eq!(store.active().unwrap().mode, ResponseMode::Compact);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("fluent in Haskell"));
        assert!(prompts[0].contains("<|USER|>What languages does Jane know?<|ASSISTANT|>"));
        assert!(!prompts[0].contains("resumes/CVs to analyze"));
    }

    #[tokio::test]
    async fn test_multiple_uploads_use_comparison_prompt_with_display_names() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("Alice first, Bob second."));
        let state = test_state(tmp.path(), llm.clone()).await;
        let alice = state
            .uploads
            .save("alice_smith.pdf.txt", b"Alice Smith. Rust and Go, 10 years.")
            .await
            .unwrap();
        let bob = state
            .uploads
            .save("bob.txt", b"Bob Jones. Java, 5 years.")
            .await
            .unwrap();

        let answer = run_chat_turn(&state, turn("Rank these candidates", vec![alice, bob]))
            .await
            .unwrap();

        assert_eq!(answer, "Alice first, Bob second.");
        let prompts = llm.prompts();
        assert!(prompts[0].contains("I have 2 different resumes/CVs to analyze."));
        assert!(prompts[0].contains("The file names are: alice_smith.pdf.txt, bob.txt"));
        assert!(prompts[0].contains("RANKING"));
        // timestamp prefixes never reach the model
        assert!(!prompts[0].contains(&format!(
            "{}_",
            chrono::Local::now().format("%Y%m%d")
        )));

        let store = state.store.read().await;
        assert_eq!(store.index_count(), 2);
        assert!(store.has_combined_index());
        assert_eq!(store.active().unwrap().mode, ResponseMode::TreeSummarize);
    }

    #[tokio::test]
    async fn test_follow_up_reuses_active_index_and_replays_history() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("answer"));
        let state = test_state(tmp.path(), llm.clone()).await;
        let file = state
            .uploads
            .save("cv.txt", b"Carol. Kubernetes operator author.")
            .await
            .unwrap();
        run_chat_turn(&state, turn("Summarize", vec![file])).await.unwrap();

        let follow_up = ChatTurn {
            message: "Any Kubernetes?".to_string(),
            history: vec![ChatMessage {
                human: "Summarize".to_string(),
                assistant: "answer".to_string(),
            }],
            uploads: vec![],
        };
        run_chat_turn(&state, follow_up).await.unwrap();

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Kubernetes operator author"));
        assert!(prompts[1].contains("<|USER|>Summarize\n<|ASSISTANT|>answer\n<|USER|>Any Kubernetes?"));
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_reported_and_store_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("unused"));
        let state = test_state(tmp.path(), llm.clone()).await;
        let file = state
            .uploads
            .save("scan.png", &[0xff, 0xd8, 0xff, 0xe0, 0x00])
            .await
            .unwrap();

        let err = run_chat_turn(&state, turn("Who is this?", vec![file]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Document(_)));
        assert!(state.store.read().await.is_empty());
    }

    struct UnreachableEmbedder;

    #[async_trait::async_trait]
    impl Embedder for UnreachableEmbedder {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            Err(EmbedderError::ApiRequestFailed("connection refused".to_string()))
        }

        fn model_name(&self) -> &str {
            "unreachable"
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces_as_embedding_error() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = Arc::new(RecordingModel::new("unused"));
        let mut state = test_state(tmp.path(), llm.clone()).await;
        state.embedder = Arc::new(UnreachableEmbedder);
        let file = state
            .uploads
            .save("jane.txt", b"Jane Doe. Rust engineer.")
            .await
            .unwrap();

        let err = run_chat_turn(&state, turn("Who is Jane?", vec![file]))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Embedding(_)));
        assert!(llm.prompts().is_empty());
        assert!(state.store.read().await.is_empty());
    }
}
