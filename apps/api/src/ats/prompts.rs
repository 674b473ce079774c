// Prompts for the LLM-backed ATS scorer.
// The JSON-only system prompt comes from llm_client::prompts.

use crate::llm_client::prompts::fill_template;

/// ATS scoring prompt. Replace `{job_description}` and `{resume}` before sending.
pub const ATS_SCORE_PROMPT_TEMPLATE: &str = r#"You are an applicant tracking system. Score how well the resume below matches the job description.

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 72,
  "strengths": ["5 years of Rust matches the core requirement"],
  "gaps": ["No Kubernetes experience mentioned"],
  "analysis": "Two or three sentences summarising the fit."
}

Rules:
- "score" is an integer from 0 to 100. Use null only if the resume is not a resume at all.
- List at most 5 strengths and at most 5 gaps, most important first.
- Judge only from the text given. Do not invent experience.

JOB DESCRIPTION:
{job_description}

RESUME:
{resume}
"#;

pub fn ats_score_prompt(job_description: &str, resume: &str) -> String {
    fill_template(
        ATS_SCORE_PROMPT_TEMPLATE,
        &[("job_description", job_description), ("resume", resume)],
    )
}
