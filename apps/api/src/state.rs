use std::sync::Arc;

use tokio::sync::RwLock;

use crate::ats::scoring::AtsScorer;
use crate::config::Config;
use crate::documents::store::DocumentStore;
use crate::documents::uploads::UploadDir;
use crate::llm_client::ChatModel;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::query_engine::QuerySettings;
use crate::retrieval::splitter::SentenceSplitter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub llm: Arc<dyn ChatModel>,
    pub embedder: Arc<dyn Embedder>,
    pub splitter: SentenceSplitter,
    pub query_settings: QuerySettings,
    /// Documents and indices of the current chat. Shared by every client.
    pub store: Arc<RwLock<DocumentStore>>,
    pub uploads: UploadDir,
    /// Pluggable ATS scorer, picked at startup from `ATS_SCORER`.
    pub ats_scorer: Arc<dyn AtsScorer>,
}

impl AppState {
    pub fn new(
        config: Config,
        llm: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        ats_scorer: Arc<dyn AtsScorer>,
        uploads: UploadDir,
    ) -> Self {
        let splitter = SentenceSplitter::new(config.chunk_size, config.chunk_overlap);
        let query_settings = QuerySettings {
            similarity_top_k: config.similarity_top_k,
            context_window: config.context_window,
            num_output: config.max_new_tokens,
        };

        Self {
            config,
            llm,
            embedder,
            splitter,
            query_settings,
            store: Arc::new(RwLock::new(DocumentStore::default())),
            uploads,
            ats_scorer,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// Default config, local hashing embedder, keyword ATS scorer and an upload
    /// dir under `dir`.
    pub async fn for_tests(dir: &std::path::Path, llm: Arc<dyn ChatModel>) -> Self {
        let config = Config::from_lookup(|key| match key {
            "GROQ_API_KEY" => Some("test".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(
            config,
            llm,
            Arc::new(crate::retrieval::embedder::testing::HashingEmbedder::default()),
            Arc::new(crate::ats::scoring::KeywordAtsScorer),
            UploadDir::open(dir).await.unwrap(),
        )
    }
}
