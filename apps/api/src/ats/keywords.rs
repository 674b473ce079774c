//! Keyword inventory of a job description and whole-word / stem matching
//! against resume text.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Size of the keyword inventory kept per job description.
pub const MAX_KEYWORDS: usize = 40;

/// Bigrams outrank the single words they are made of.
const BIGRAM_WEIGHT: f32 = 1.5;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "being", "both", "but", "by", "can", "could", "do", "does", "each",
    "etc", "for", "from", "had", "has", "have", "having", "he", "her", "his", "how", "i", "if",
    "in", "including", "into", "is", "it", "its", "just", "like", "may", "me", "more", "most",
    "must", "my", "no", "not", "of", "on", "one", "or", "other", "our", "out", "over", "own",
    "per", "plus", "preferred", "required", "role", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "up", "us", "use", "using", "very", "via", "was", "we",
    "well", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "within", "work", "would", "year", "years", "you", "your",
];

/// Suffixes stripped by [`stem`], longest first.
const SUFFIXES: &[&str] = &[
    "ations", "ation", "ments", "ment", "ings", "ing", "ers", "er", "ies", "ed", "es", "s",
];

/// One keyword of the inventory. `weight` is the frequency, boosted for bigrams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u32,
    pub weight: f32,
}

/// Lowercased words, keeping the symbols that matter in tech names
/// (`c++`, `c#`, `node.js`).
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.')))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn is_candidate(word: &str) -> bool {
    word.chars().count() >= 2 && !is_stop_word(word) && !word.chars().all(|c| c.is_ascii_digit())
}

/// Extracts the weighted keyword inventory of a job description.
///
/// Unigrams count every occurrence. Bigrams of two adjacent candidate words
/// are kept only when they occur at least twice.
pub fn extract_keywords(job_description: &str) -> Vec<KeywordEntry> {
    let tokens = tokenize(job_description);

    let mut unigrams: HashMap<&str, u32> = HashMap::new();
    let mut bigrams: HashMap<String, u32> = HashMap::new();

    for (i, token) in tokens.iter().enumerate() {
        if !is_candidate(token) {
            continue;
        }
        *unigrams.entry(token.as_str()).or_default() += 1;

        if let Some(next) = tokens.get(i + 1).filter(|n| is_candidate(n)) {
            *bigrams.entry(format!("{token} {next}")).or_default() += 1;
        }
    }

    let mut entries: Vec<KeywordEntry> = unigrams
        .into_iter()
        .map(|(word, frequency)| KeywordEntry {
            keyword: word.to_string(),
            frequency,
            weight: frequency as f32,
        })
        .chain(
            bigrams
                .into_iter()
                .filter(|(_, frequency)| *frequency >= 2)
                .map(|(phrase, frequency)| KeywordEntry {
                    keyword: phrase,
                    frequency,
                    weight: frequency as f32 * BIGRAM_WEIGHT,
                }),
        )
        .collect();

    entries.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    entries.truncate(MAX_KEYWORDS);
    entries
}

/// Crude suffix-stripping stem; never shortens a word below three characters.
pub fn stem(word: &str) -> &str {
    for suffix in SUFFIXES {
        if let Some(root) = word.strip_suffix(suffix) {
            if root.chars().count() >= 3 {
                return root;
            }
        }
    }
    word
}

fn loosely_equal(a: &str, b: &str) -> bool {
    if stem(a) == stem(b) {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.chars().count() >= 4 && long.starts_with(short)
}

/// Resume text prepared for repeated keyword lookups.
pub struct ResumeTerms {
    tokens: Vec<String>,
    vocabulary: HashSet<String>,
}

impl ResumeTerms {
    pub fn new(resume_text: &str) -> Self {
        let tokens = tokenize(resume_text);
        let vocabulary = tokens.iter().cloned().collect();
        Self { tokens, vocabulary }
    }

    /// Match strength of `keyword` and the resume words that produced it.
    ///
    /// 1.0 when the keyword appears as whole words, 0.6 when every word of it
    /// matches some resume word by stem or prefix, 0.0 otherwise.
    pub fn match_strength(&self, keyword: &str) -> (f32, Option<String>) {
        let words: Vec<&str> = keyword.split_whitespace().collect();
        if words.is_empty() {
            return (0.0, None);
        }

        if self.contains_phrase(&words) {
            return (1.0, Some(keyword.to_string()));
        }

        let mut evidence = Vec::with_capacity(words.len());
        for word in &words {
            match self.vocabulary.iter().find(|t| loosely_equal(word, t)) {
                Some(found) => evidence.push(found.as_str()),
                None => return (0.0, None),
            }
        }
        (0.6, Some(evidence.join(" ")))
    }

    fn contains_phrase(&self, words: &[&str]) -> bool {
        if words.len() == 1 {
            return self.vocabulary.contains(words[0]);
        }
        self.tokens
            .windows(words.len())
            .any(|window| window.iter().zip(words).all(|(t, w)| t == w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "Senior Rust Engineer. We need distributed systems experience. \
        Rust is required; distributed systems at scale, Kubernetes and C++ a plus. \
        You will mentor engineers.";

    fn keyword<'a>(entries: &'a [KeywordEntry], kw: &str) -> Option<&'a KeywordEntry> {
        entries.iter().find(|e| e.keyword == kw)
    }

    #[test]
    fn test_tokenize_keeps_tech_symbols() {
        assert_eq!(
            tokenize("C++, C# and Node.js."),
            vec!["c++", "c#", "and", "node.js"]
        );
    }

    #[test]
    fn test_extract_keywords_counts_and_filters_stop_words() {
        let entries = extract_keywords(JD);
        assert_eq!(keyword(&entries, "rust").unwrap().frequency, 2);
        assert!(keyword(&entries, "the").is_none());
        assert!(keyword(&entries, "required").is_none());
        assert!(keyword(&entries, "c++").is_some());
    }

    #[test]
    fn test_repeated_bigrams_are_kept_and_ranked_first() {
        let entries = extract_keywords(JD);
        let bigram = keyword(&entries, "distributed systems").unwrap();
        assert_eq!(bigram.frequency, 2);
        assert_eq!(bigram.weight, 3.0);
        assert_eq!(entries[0].keyword, "distributed systems");
        // single-occurrence bigrams are noise
        assert!(keyword(&entries, "senior rust").is_none());
    }

    #[test]
    fn test_inventory_is_capped() {
        let jd: String = (0..100).map(|i| format!("skill{i} ")).collect();
        assert_eq!(extract_keywords(&jd).len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_empty_description_has_no_keywords() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("the and of 2024").is_empty());
    }

    #[test]
    fn test_stem_strips_common_suffixes() {
        assert_eq!(stem("deployments"), "deploy");
        assert_eq!(stem("testing"), "test");
        assert_eq!(stem("engineers"), "engine");
        assert_eq!(stem("go"), "go");
        assert_eq!(stem("uses"), "use");
    }

    #[test]
    fn test_whole_word_match_scores_full() {
        let resume = ResumeTerms::new("Built distributed systems in Rust.");
        assert_eq!(resume.match_strength("rust").0, 1.0);
        assert_eq!(resume.match_strength("distributed systems").0, 1.0);
    }

    #[test]
    fn test_substring_is_not_a_whole_word_match() {
        let resume = ResumeTerms::new("Trusted teammate");
        assert_eq!(resume.match_strength("rust").0, 0.0);
    }

    #[test]
    fn test_stem_or_prefix_match_scores_partial() {
        let resume = ResumeTerms::new("Led Kubernetes deployments and mentoring.");
        let (strength, evidence) = resume.match_strength("deployment");
        assert_eq!(strength, 0.6);
        assert_eq!(evidence.as_deref(), Some("deployments"));
        assert_eq!(resume.match_strength("mentor").0, 0.6);
    }

    #[test]
    fn test_bigram_needs_every_word() {
        let resume = ResumeTerms::new("Worked on distributed caches");
        assert_eq!(resume.match_strength("distributed systems").0, 0.0);
    }
}
