//! Query engine: retrieves the most relevant nodes for a query and asks the
//! LLM to synthesize an answer from them.
//!
//! Two synthesis strategies:
//! - `Compact`: stuff as much context as fits into one QA prompt, then refine
//!   the answer over whatever did not fit.
//! - `TreeSummarize`: answer each context pack independently, then summarize
//!   the partial answers bottom-up until one remains. Used for multi-resume
//!   comparisons where every source should get a say.

use serde::Serialize;
use tracing::debug;

use crate::llm_client::prompts::QA_SYSTEM;
use crate::llm_client::ChatModel;
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index::{ScoredNode, VectorIndex};
use crate::retrieval::{estimate_tokens, prompts, truncate_to_tokens, RetrievalError};

/// Returned when retrieval finds nothing to answer from.
pub const EMPTY_RESPONSE: &str = "Empty Response";

/// Never squeeze a context pack below this many tokens, however small the window.
const MIN_PACK_TOKENS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Compact,
    TreeSummarize,
}

/// Retrieval depth and prompt budget shared by every query.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub similarity_top_k: usize,
    pub context_window: usize,
    pub num_output: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 2,
            context_window: 4096,
            num_output: 1024,
        }
    }
}

pub struct QueryEngine<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    llm: &'a dyn ChatModel,
    settings: &'a QuerySettings,
    mode: ResponseMode,
    per_source: bool,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        llm: &'a dyn ChatModel,
        settings: &'a QuerySettings,
        mode: ResponseMode,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            settings,
            mode,
            per_source: false,
        }
    }

    /// Retrieve `similarity_top_k` nodes from every source file instead of overall.
    pub fn per_source(mut self, per_source: bool) -> Self {
        self.per_source = per_source;
        self
    }

    pub async fn query(&self, query: &str) -> Result<String, RetrievalError> {
        if self.index.is_empty() {
            debug!("Query against empty index; skipping synthesis");
            return Ok(EMPTY_RESPONSE.to_string());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let top_k = self.settings.similarity_top_k;
        let nodes: Vec<ScoredNode<'_>> = if self.per_source {
            self.index.retrieve_per_source(&query_embedding, top_k)
        } else {
            self.index.retrieve(&query_embedding, top_k)
        };

        if nodes.is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }

        debug!(
            "Retrieved {} nodes (mode={:?}, best score={:.3})",
            nodes.len(),
            self.mode,
            nodes[0].score
        );

        let texts: Vec<String> = nodes.iter().map(|n| n.node.content_with_metadata()).collect();

        match self.mode {
            ResponseMode::Compact => self.compact(query, texts).await,
            ResponseMode::TreeSummarize => self.tree_summarize(query, texts).await,
        }
    }

    async fn compact(&self, query: &str, texts: Vec<String>) -> Result<String, RetrievalError> {
        let budget = self.pack_budget(&prompts::refine(query, "", ""));
        let packs = pack_texts(&texts, budget);

        let mut answer: Option<String> = None;
        for pack in &packs {
            let prompt = match &answer {
                None => prompts::text_qa(pack, query),
                Some(existing) => prompts::refine(query, existing, pack),
            };
            answer = Some(self.llm.complete(&prompt, QA_SYSTEM).await?);
        }

        Ok(answer.unwrap_or_else(|| EMPTY_RESPONSE.to_string()))
    }

    async fn tree_summarize(
        &self,
        query: &str,
        texts: Vec<String>,
    ) -> Result<String, RetrievalError> {
        let budget = self.pack_budget(&prompts::summary("", query));
        let mut level = texts;

        loop {
            let packs = pack_for_tree(&level, budget);
            let mut summaries = Vec::with_capacity(packs.len());
            for pack in &packs {
                let prompt = prompts::summary(pack, query);
                summaries.push(self.llm.complete(&prompt, QA_SYSTEM).await?);
            }

            debug!("Tree summarize level: {} -> {}", level.len(), summaries.len());

            if summaries.len() <= 1 {
                return Ok(summaries
                    .pop()
                    .unwrap_or_else(|| EMPTY_RESPONSE.to_string()));
            }
            level = summaries;
        }
    }

    /// Tokens left for context once the template and the answer are accounted for.
    fn pack_budget(&self, empty_prompt: &str) -> usize {
        self.settings
            .context_window
            .saturating_sub(self.settings.num_output)
            .saturating_sub(estimate_tokens(empty_prompt))
            .max(MIN_PACK_TOKENS)
    }
}

/// Greedily joins texts (separated by blank lines) into packs of at most
/// `budget` tokens. A single text over budget is truncated to fit.
fn pack_texts(texts: &[String], budget: usize) -> Vec<String> {
    let mut packs = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    for text in texts {
        let text = truncate_to_tokens(text, budget);
        let tokens = estimate_tokens(&text);

        if !current.is_empty() && current_tokens + 1 + tokens > budget {
            packs.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_tokens += 1;
        }
        current.push_str(&text);
        current_tokens += tokens;
    }

    if !current.is_empty() {
        packs.push(current);
    }
    packs
}

/// Like `pack_texts`, but guarantees each level of the tree gets smaller:
/// when nothing can be combined at full length, texts are halved and paired.
fn pack_for_tree(texts: &[String], budget: usize) -> Vec<String> {
    let packs = pack_texts(texts, budget);
    if packs.len() < texts.len() || texts.len() <= 1 {
        return packs;
    }

    let half = (budget / 2).max(1);
    texts
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|t| truncate_to_tokens(t, half))
                .collect::<Vec<_>>()
                .join("\n\n")
        })
        .collect()
}
