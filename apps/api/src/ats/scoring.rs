//! ATS scoring: pluggable, trait-based scorer that measures a resume against a
//! job description.
//!
//! Default: `KeywordAtsScorer` (deterministic, no LLM call).
//! `LlmAtsScorer` asks the chat model for a JSON verdict instead.
//!
//! `AppState` holds an `Arc<dyn AtsScorer>`, picked at startup from `ATS_SCORER`.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ats::keywords::{extract_keywords, ResumeTerms};
use crate::ats::prompts::ats_score_prompt;
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{complete_json, ChatModel, LlmError};
use crate::retrieval::truncate_to_tokens;

// ────────────────────────────────────────────────────────────────────────────
// Output data models (shared across all scorer backends)
// ────────────────────────────────────────────────────────────────────────────

/// A job-description keyword found in the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub weight: f32,
    pub strength: f32, // 0.0 – 1.0
    /// Resume words that produced the match.
    pub evidence: String,
}

/// Full ATS report returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtsReport {
    pub score: Option<u32>, // 0 – 100, None when no score could be produced
    pub strong_matches: Vec<KeywordMatch>,  // strength ≥ 0.8
    pub partial_matches: Vec<KeywordMatch>, // 0.4 – 0.79
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub analysis: String,
    /// Markdown rendering of the whole report.
    pub full_analysis: String,
    pub scorer_backend: String, // "keyword" | "llm"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtsBackend {
    Keyword,
    Llm,
}

impl FromStr for AtsBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(AtsBackend::Keyword),
            "llm" => Ok(AtsBackend::Llm),
            other => Err(format!("unknown ATS scorer {other:?}")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap scoring backends without touching the handler.
#[async_trait]
pub trait AtsScorer: Send + Sync {
    async fn score(&self, resume_text: &str, job_description: &str)
        -> Result<AtsReport, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordAtsScorer
// ────────────────────────────────────────────────────────────────────────────

/// Keyword-based scorer.
///
/// Algorithm:
/// 1. Extract the weighted keyword inventory of the job description.
/// 2. For each keyword: whole-word match → 1.0, stem/prefix match → 0.6,
///    no match → 0.0
/// 3. score = Σ(strength × weight) / Σ(weight) × 100
/// 4. Classify: strong (≥0.8), partial (0.4–0.79), gap (<0.4)
pub struct KeywordAtsScorer;

#[async_trait]
impl AtsScorer for KeywordAtsScorer {
    async fn score(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AtsReport, AppError> {
        Ok(compute_keyword_score(resume_text, job_description))
    }
}

fn compute_keyword_score(resume_text: &str, job_description: &str) -> AtsReport {
    let keywords = extract_keywords(job_description);

    if keywords.is_empty() {
        return finish(AtsReport {
            score: None,
            strong_matches: vec![],
            partial_matches: vec![],
            strengths: vec![],
            gaps: vec![],
            analysis: "No keywords found in the job description, cannot score.".to_string(),
            full_analysis: String::new(),
            scorer_backend: "keyword".to_string(),
        });
    }

    let resume = ResumeTerms::new(resume_text);
    let mut strong_matches = Vec::new();
    let mut partial_matches = Vec::new();
    let mut gaps = Vec::new();

    let mut total_weight = 0.0_f32;
    let mut total_score = 0.0_f32;

    for kw in &keywords {
        let (strength, evidence) = resume.match_strength(&kw.keyword);
        total_weight += kw.weight;
        total_score += strength * kw.weight;

        let found = KeywordMatch {
            keyword: kw.keyword.clone(),
            weight: kw.weight,
            strength,
            evidence: evidence.unwrap_or_default(),
        };

        if strength >= 0.8 {
            strong_matches.push(found);
        } else if strength >= 0.4 {
            partial_matches.push(found);
        } else {
            gaps.push(kw.keyword.clone());
        }
    }

    let score = ((total_score / total_weight) * 100.0).round().min(100.0) as u32;

    finish(AtsReport {
        score: Some(score),
        strengths: strong_matches.iter().map(|m| m.keyword.clone()).collect(),
        strong_matches,
        partial_matches,
        analysis: build_recommendation(score, &gaps),
        gaps,
        full_analysis: String::new(),
        scorer_backend: "keyword".to_string(),
    })
}

/// Builds a human-readable recommendation string from score and gaps.
fn build_recommendation(score: u32, gaps: &[String]) -> String {
    let top_gaps: Vec<&str> = gaps.iter().take(3).map(String::as_str).collect();

    if score >= 80 {
        "Strong match. The resume covers the key job requirements.".to_string()
    } else if score >= 60 {
        format!(
            "Moderate match ({score}/100). Consider highlighting: {}.",
            top_gaps.join(", ")
        )
    } else {
        format!(
            "Low match ({score}/100). Significant gaps: {}.",
            top_gaps.join(", ")
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAtsScorer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LlmVerdict {
    score: Option<f64>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    analysis: String,
}

/// Semantic scorer backed by the chat model.
pub struct LlmAtsScorer {
    llm: Arc<dyn ChatModel>,
    /// Token budget for each of the resume and the job description.
    input_tokens: usize,
}

impl LlmAtsScorer {
    pub fn new(llm: Arc<dyn ChatModel>, context_window: usize, num_output: usize) -> Self {
        let input_tokens = (context_window.saturating_sub(num_output + 300) / 2).max(256);
        Self { llm, input_tokens }
    }
}

#[async_trait]
impl AtsScorer for LlmAtsScorer {
    async fn score(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AtsReport, AppError> {
        let prompt = ats_score_prompt(
            &truncate_to_tokens(job_description, self.input_tokens),
            &truncate_to_tokens(resume_text, self.input_tokens),
        );

        let verdict =
            match complete_json::<LlmVerdict>(self.llm.as_ref(), &prompt, JSON_ONLY_SYSTEM).await {
                Ok(v) => v,
                Err(LlmError::Parse(e)) => {
                    warn!("ATS verdict was not valid JSON: {e}");
                    LlmVerdict {
                        score: None,
                        strengths: vec![],
                        gaps: vec![],
                        analysis: "The model did not return a readable score.".to_string(),
                    }
                }
                Err(e) => return Err(e.into()),
            };

        Ok(finish(AtsReport {
            score: verdict.score.map(|s| s.round().clamp(0.0, 100.0) as u32),
            strong_matches: vec![],
            partial_matches: vec![],
            strengths: verdict.strengths,
            gaps: verdict.gaps,
            analysis: verdict.analysis,
            full_analysis: String::new(),
            scorer_backend: "llm".to_string(),
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Markdown rendering
// ────────────────────────────────────────────────────────────────────────────

fn finish(mut report: AtsReport) -> AtsReport {
    report.full_analysis = render_markdown(&report);
    report
}

fn render_markdown(report: &AtsReport) -> String {
    let mut md = String::new();
    match report.score {
        Some(score) => {
            let _ = writeln!(md, "## ATS Match Score: {score}%");
        }
        None => md.push_str("## ATS Match Score: N/A\n"),
    }

    if !report.strengths.is_empty() {
        md.push_str("\n### Strengths\n");
        for s in &report.strengths {
            let _ = writeln!(md, "- {s}");
        }
    }

    if !report.partial_matches.is_empty() {
        md.push_str("\n### Partial matches\n");
        for m in &report.partial_matches {
            let _ = writeln!(md, "- {} (resume: {})", m.keyword, m.evidence);
        }
    }

    if !report.gaps.is_empty() {
        md.push_str("\n### Gaps\n");
        for g in &report.gaps {
            let _ = writeln!(md, "- {g}");
        }
    }

    if !report.analysis.is_empty() {
        let _ = write!(md, "\n### Analysis\n{}\n", report.analysis);
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::RecordingModel;

    const JD: &str = "Backend engineer. Rust and PostgreSQL. Rust services on Kubernetes. \
        Kafka experience. Rust!";

    #[test]
    fn test_full_keyword_coverage_scores_strong() {
        let report = compute_keyword_score(
            "Rust backend engineer running PostgreSQL, Kafka and Kubernetes services; experience.",
            JD,
        );
        assert_eq!(report.score, Some(100));
        assert!(report.gaps.is_empty());
        assert!(report.partial_matches.is_empty());
        assert!(report.strengths.contains(&"rust".to_string()));
    }

    #[test]
    fn test_missing_keywords_become_gaps() {
        let report = compute_keyword_score("Python developer", JD);
        assert_eq!(report.score, Some(0));
        assert!(report.gaps.contains(&"kafka".to_string()));
        assert!(report.strong_matches.is_empty());
        assert!(report.full_analysis.contains("### Gaps\n"));
        assert!(report.analysis.starts_with("Low match (0/100)"));
    }

    #[test]
    fn test_stem_match_counts_as_partial() {
        let report = compute_keyword_score("Experienced engineers team lead", "engineer");
        assert_eq!(report.score, Some(60));
        assert_eq!(report.partial_matches.len(), 1);
        assert_eq!(report.partial_matches[0].evidence, "engineers");
        assert!(report.full_analysis.contains("- engineer (resume: engineers)"));
    }

    #[test]
    fn test_heavier_keywords_dominate_score() {
        // rust appears 3 times in the JD, kafka once
        let with_rust = compute_keyword_score("Rust", JD).score.unwrap();
        let with_kafka = compute_keyword_score("Kafka", JD).score.unwrap();
        assert!(with_rust > with_kafka);
    }

    #[test]
    fn test_empty_job_description_has_no_score() {
        let report = compute_keyword_score("Rust developer", "the and of");
        assert_eq!(report.score, None);
        assert!(report.full_analysis.starts_with("## ATS Match Score: N/A"));
        assert_eq!(report.scorer_backend, "keyword");
    }

    #[test]
    fn test_recommendation_bands() {
        assert!(build_recommendation(85, &[]).contains("Strong match"));
        let gaps = vec!["kafka".to_string()];
        let moderate = build_recommendation(65, &gaps);
        assert!(moderate.contains("65") && moderate.contains("kafka"));
        assert!(build_recommendation(30, &gaps).contains("Low match (30/100)"));
    }

    #[test]
    fn test_backend_parses_case_insensitively() {
        assert_eq!("keyword".parse::<AtsBackend>(), Ok(AtsBackend::Keyword));
        assert_eq!(" LLM ".parse::<AtsBackend>(), Ok(AtsBackend::Llm));
        assert!("semantic".parse::<AtsBackend>().is_err());
    }

    #[tokio::test]
    async fn test_llm_scorer_reads_json_verdict() {
        let llm = Arc::new(RecordingModel::new(
            r#"```json
{"score": 87.4, "strengths": ["Rust"], "gaps": ["Kafka"], "analysis": "Good fit."}
```"#,
        ));
        let scorer = LlmAtsScorer::new(llm.clone(), 4096, 1024);

        let report = scorer.score("Rust engineer", "Need Rust and Kafka").await.unwrap();

        assert_eq!(report.score, Some(87));
        assert_eq!(report.strengths, vec!["Rust"]);
        assert_eq!(report.scorer_backend, "llm");
        assert!(report.full_analysis.contains("## ATS Match Score: 87%"));
        assert!(report.full_analysis.contains("### Analysis\nGood fit."));
        let prompts = llm.prompts();
        assert!(prompts[0].contains("JOB DESCRIPTION:\nNeed Rust and Kafka"));
        assert!(prompts[0].contains("RESUME:\nRust engineer"));
    }

    #[tokio::test]
    async fn test_llm_scorer_clamps_and_accepts_null_score() {
        let scorer = LlmAtsScorer::new(Arc::new(RecordingModel::new(r#"{"score": 140}"#)), 4096, 1024);
        assert_eq!(scorer.score("r", "j").await.unwrap().score, Some(100));

        let scorer = LlmAtsScorer::new(Arc::new(RecordingModel::new(r#"{"score": null}"#)), 4096, 1024);
        assert_eq!(scorer.score("r", "j").await.unwrap().score, None);
    }

    #[tokio::test]
    async fn test_llm_scorer_survives_unparseable_reply() {
        let scorer =
            LlmAtsScorer::new(Arc::new(RecordingModel::new("I think about 70%")), 4096, 1024);
        let report = scorer.score("r", "j").await.unwrap();
        assert_eq!(report.score, None);
        assert!(report.full_analysis.contains("N/A"));
    }
}
