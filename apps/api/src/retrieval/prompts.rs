// Answer-synthesis templates used by the query engine.
// Placeholders are filled in a single pass by `fill_template`.

use crate::llm_client::prompts::fill_template;

/// First pass over retrieved context. Replace `{context_str}` and `{query_str}`.
pub const TEXT_QA_TEMPLATE: &str = "Context information is below.
---------------------
{context_str}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {query_str}
Answer: ";

/// Follow-up passes when the context did not fit in one prompt.
/// Replace `{query_str}`, `{existing_answer}` and `{context_msg}`.
pub const REFINE_TEMPLATE: &str = "The original query is as follows: {query_str}
We have provided an existing answer: {existing_answer}
We have the opportunity to refine the existing answer (only if needed) with some more context below.
------------
{context_msg}
------------
Given the new context, refine the original answer to better answer the query. If the context isn't useful, return the original answer.
Refined Answer: ";

/// Tree-summarize pass over context from several sources.
/// Replace `{context_str}` and `{query_str}`.
pub const SUMMARY_TEMPLATE: &str = "Context information from multiple sources is below.
---------------------
{context_str}
---------------------
Given the information from multiple sources and not prior knowledge, answer the query.
Query: {query_str}
Answer: ";

pub fn text_qa(context: &str, query: &str) -> String {
    fill_template(
        TEXT_QA_TEMPLATE,
        &[("context_str", context), ("query_str", query)],
    )
}

pub fn refine(query: &str, existing_answer: &str, context: &str) -> String {
    fill_template(
        REFINE_TEMPLATE,
        &[
            ("query_str", query),
            ("existing_answer", existing_answer),
            ("context_msg", context),
        ],
    )
}

pub fn summary(context: &str, query: &str) -> String {
    fill_template(
        SUMMARY_TEMPLATE,
        &[("context_str", context), ("query_str", query)],
    )
}
