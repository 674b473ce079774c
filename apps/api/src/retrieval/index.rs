use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::documents::Document;
use crate::retrieval::embedder::{Embedder, EmbedderError};
use crate::retrieval::splitter::SentenceSplitter;

/// One embedded chunk of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: Uuid,
    pub text: String,
    pub file_name: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Node {
    /// Text handed to the LLM: the chunk prefixed with its source file so the
    /// model can attribute details when several resumes are in play.
    pub fn content_with_metadata(&self) -> String {
        format!("file_name: {}\n\n{}", self.file_name, self.text)
    }
}

#[derive(Debug, Clone)]
pub struct ScoredNode<'a> {
    pub node: &'a Node,
    pub score: f32,
}

/// Immutable in-memory vector index, searched by brute-force cosine similarity.
/// Rebuilt from scratch whenever the active document set changes.
#[derive(Debug, Default)]
pub struct VectorIndex {
    nodes: Vec<Node>,
}

impl VectorIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Chunks and embeds `documents` into a new index.
    pub async fn from_documents(
        documents: &[Document],
        splitter: &SentenceSplitter,
        embedder: &dyn Embedder,
    ) -> Result<Self, EmbedderError> {
        let mut pending: Vec<(String, String)> = Vec::new();
        for doc in documents {
            for chunk in splitter.split(&doc.text) {
                pending.push((doc.file_name.clone(), chunk));
            }
        }

        if pending.is_empty() {
            return Ok(Self::empty());
        }

        let texts: Vec<&str> = pending.iter().map(|(_, text)| text.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;
        if embeddings.len() != pending.len() {
            return Err(EmbedderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                pending.len(),
                embeddings.len()
            )));
        }

        let nodes: Vec<Node> = pending
            .into_iter()
            .zip(embeddings)
            .map(|((file_name, text), embedding)| Node {
                id: Uuid::new_v4(),
                text,
                file_name,
                embedding,
            })
            .collect();

        debug!("Built index with {} nodes", nodes.len());
        Ok(Self { nodes })
    }

    /// Combines already-built indices without re-embedding anything.
    pub fn merge<'a>(indices: impl IntoIterator<Item = &'a Arc<VectorIndex>>) -> Self {
        Self {
            nodes: indices
                .into_iter()
                .flat_map(|index| index.nodes.iter().cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node count per source file.
    pub fn source_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.file_name.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// The `top_k` most similar nodes, best first.
    pub fn retrieve(&self, query: &[f32], top_k: usize) -> Vec<ScoredNode<'_>> {
        let mut scored = self.score_all(query);
        scored.truncate(top_k);
        scored
    }

    /// The `top_k` most similar nodes from each source file, best first.
    /// Keeps one strong resume from crowding the others out of a comparison.
    pub fn retrieve_per_source(&self, query: &[f32], top_k: usize) -> Vec<ScoredNode<'_>> {
        let mut taken: BTreeMap<&str, usize> = BTreeMap::new();
        self.score_all(query)
            .into_iter()
            .filter(|scored| {
                let count = taken.entry(scored.node.file_name.as_str()).or_insert(0);
                *count += 1;
                *count <= top_k
            })
            .collect()
    }

    fn score_all(&self, query: &[f32]) -> Vec<ScoredNode<'_>> {
        let mut scored: Vec<ScoredNode<'_>> = self
            .nodes
            .iter()
            .map(|node| ScoredNode {
                node,
                score: cosine_similarity(query, &node.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

/// Cosine similarity; zero when either vector has no magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
