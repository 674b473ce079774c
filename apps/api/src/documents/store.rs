use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::documents::Document;
use crate::retrieval::index::VectorIndex;
use crate::retrieval::query_engine::ResponseMode;

/// The index chat turns currently answer from, and how.
#[derive(Debug, Clone)]
pub struct ActiveEngine {
    pub index: Arc<VectorIndex>,
    pub mode: ResponseMode,
    /// Retrieve per source file (multi-resume comparisons).
    pub per_source: bool,
}

impl ActiveEngine {
    pub fn empty() -> Self {
        Self {
            index: Arc::new(VectorIndex::empty()),
            mode: ResponseMode::Compact,
            per_source: false,
        }
    }
}

/// One per-file entry produced while indexing an upload turn.
pub struct IndexedFile {
    pub display_name: String,
    pub documents: Vec<Document>,
    pub index: Arc<VectorIndex>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub file_name: String,
    pub characters: usize,
    pub chunks: usize,
}

/// Process-wide document and index store. Lives behind a lock in `AppState`;
/// every method is synchronous so the lock is never held across an await.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: BTreeMap<String, Vec<Document>>,
    indices: BTreeMap<String, Arc<VectorIndex>>,
    combined_index: Option<Arc<VectorIndex>>,
    active: Option<ActiveEngine>,
}

impl DocumentStore {
    /// Replaces the store with a single file and makes its index current.
    pub fn install_single(&mut self, file: IndexedFile) -> ActiveEngine {
        let engine = ActiveEngine {
            index: Arc::clone(&file.index),
            mode: ResponseMode::Compact,
            per_source: false,
        };
        self.documents = BTreeMap::from([(file.display_name.clone(), file.documents)]);
        self.indices = BTreeMap::from([(file.display_name, file.index)]);
        self.combined_index = None;
        self.active = Some(engine.clone());
        engine
    }

    /// Replaces the store with several files plus their combined index, and
    /// makes the combined index current in tree-summarize mode.
    pub fn install_many(
        &mut self,
        files: Vec<IndexedFile>,
        combined: Arc<VectorIndex>,
    ) -> ActiveEngine {
        self.documents.clear();
        self.indices.clear();
        for file in files {
            self.documents.insert(file.display_name.clone(), file.documents);
            self.indices.insert(file.display_name, file.index);
        }

        let engine = ActiveEngine {
            index: Arc::clone(&combined),
            mode: ResponseMode::TreeSummarize,
            per_source: true,
        };
        self.combined_index = Some(combined);
        self.active = Some(engine.clone());
        engine
    }

    /// The current engine, installing an empty one on first use.
    pub fn active_or_empty(&mut self) -> ActiveEngine {
        self.active.get_or_insert_with(ActiveEngine::empty).clone()
    }

    pub fn active(&self) -> Option<&ActiveEngine> {
        self.active.as_ref()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when the store is in its initial shape.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.indices.is_empty()
            && self.combined_index.is_none()
            && self.active.is_none()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_combined_index(&self) -> bool {
        self.combined_index.is_some()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.documents.keys().map(String::as_str).collect()
    }

    pub fn summaries(&self) -> Vec<DocumentSummary> {
        self.documents
            .iter()
            .map(|(name, docs)| DocumentSummary {
                file_name: name.clone(),
                characters: docs.iter().map(|d| d.text.chars().count()).sum(),
                chunks: self.indices.get(name).map(|i| i.len()).unwrap_or(0),
            })
            .collect()
    }
}
