// Prompt shaping for chat turns.
// The `<|USER|>` / `<|ASSISTANT|>` markers delimit turns inside a single prompt.

use crate::chat::models::ChatMessage;
use crate::llm_client::prompts::fill_template;

/// Only the most recent turns are replayed to the model.
pub const HISTORY_WINDOW: usize = 10;

/// Words that make a multi-resume question ask for a structured ranking.
const RANKING_KEYWORDS: &[&str] = &["rank", "sort", "order", "best", "top", "compare", "better"];

/// Comparison preamble. Replace `{file_count}`, `{file_names}` and `{message}`.
pub const COMPARISON_PROMPT_TEMPLATE: &str = "
I have {file_count} different resumes/CVs to analyze.

The file names are: {file_names}

For comparison purposes, please maintain awareness of which details come from which resume.
When analyzing multiple resumes, please:
1. Compare key skills, experience, and qualifications across candidates
2. Identify relative strengths and weaknesses
3. If asked to rank or rate candidates, provide clear justification

My question is: {message}
";

/// Appended to comparison prompts when the question asks for a ranking.
pub const RANKING_INSTRUCTIONS: &str = "
Please provide your analysis in a structured format:

1. COMPARISON SUMMARY: Brief overview of how the resumes compare
2. INDIVIDUAL ASSESSMENTS: For each resume, provide key strengths/weaknesses
3. RANKING: If requested, provide a ranked list with justification for each position
4. RECOMMENDATION: Which candidate(s) might be best suited and why
";

/// Renders the last `HISTORY_WINDOW` turns, oldest first.
pub fn history_context(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|m| format!("<|USER|>{}\n<|ASSISTANT|>{}", m.human, m.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Appends the new user turn to the rendered history.
pub fn wrap_turn(context: &str, user_turn: &str) -> String {
    format!("{context}\n<|USER|>{user_turn}<|ASSISTANT|>")
}

pub fn wants_ranking(message: &str) -> bool {
    let lower = message.to_lowercase();
    RANKING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Builds the multi-resume comparison prompt for `message` over `file_names`.
pub fn comparison_prompt(message: &str, file_names: &[String]) -> String {
    let file_count = file_names.len().to_string();
    let listed = file_names.join(", ");
    let mut prompt = fill_template(
        COMPARISON_PROMPT_TEMPLATE,
        &[
            ("file_count", file_count.as_str()),
            ("file_names", listed.as_str()),
            ("message", message),
        ],
    );

    if wants_ranking(message) {
        prompt.push_str(RANKING_INSTRUCTIONS);
    }
    prompt
}
