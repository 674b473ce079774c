// System prompts shared by chat answering and ATS scoring, plus the template
// filler every task prompt goes through.
// Task-specific templates live next to the code that fills them.

/// System prompt for every resume Q&A call.
pub const QA_SYSTEM: &str = "You are a Q&A assistant. Your goal is to answer questions \
    based on the text given. The previous chat history may be included, so answer \
    the last question asked.";

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";


/// Fills `{key}` placeholders in one left-to-right pass.
///
/// Substituted values are never rescanned, so resume text or file names that
/// happen to contain `{query_str}` or similar reach the model verbatim.
/// Braces that do not name a known key are kept as they are.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];

        let hit = vars.iter().find(|(key, _)| {
            tail.strip_prefix(key)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}
