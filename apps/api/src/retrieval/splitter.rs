use unicode_segmentation::UnicodeSegmentation;

use crate::retrieval::estimate_tokens;

/// Splits text into overlapping chunks, keeping sentences whole where possible.
///
/// Sizes are in cl100k tokens. A sentence longer than `chunk_size` is cut at
/// word boundaries; a single word longer than that (or unspaced CJK text) is
/// cut by characters.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(1024, 200)
    }
}

impl SentenceSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces: Vec<String> = sentences(text)
            .into_iter()
            .flat_map(|s| self.bound(s))
            .collect();

        let mut chunks = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();
        let mut current_tokens = 0;

        for piece in pieces {
            let tokens = estimate_tokens(&piece);

            if !current.is_empty() && current_tokens + tokens > self.chunk_size {
                chunks.push(join(&current));

                // Carry the tail of the finished chunk forward as overlap
                let mut carried = Vec::new();
                let mut carried_tokens = 0;
                for (text, t) in current.iter().rev() {
                    if carried_tokens + t > self.chunk_overlap {
                        break;
                    }
                    carried_tokens += t;
                    carried.push((text.clone(), *t));
                }
                carried.reverse();

                while !carried.is_empty() && carried_tokens + tokens > self.chunk_size {
                    let (_, t) = carried.remove(0);
                    carried_tokens -= t;
                }

                current = carried;
                current_tokens = carried_tokens;
            }

            current_tokens += tokens;
            current.push((piece, tokens));
        }

        if !current.is_empty() {
            chunks.push(join(&current));
        }

        chunks
    }

    /// Cuts an oversized sentence into pieces that each fit in one chunk.
    fn bound(&self, sentence: &str) -> Vec<String> {
        if estimate_tokens(sentence) <= self.chunk_size {
            return vec![sentence.to_string()];
        }

        let mut out = Vec::new();
        let mut buf = String::new();

        for word in sentence.split_whitespace() {
            if estimate_tokens(word) > self.chunk_size {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                out.extend(self.cut_word(word));
                continue;
            }

            let candidate = if buf.is_empty() {
                word.to_string()
            } else {
                format!("{buf} {word}")
            };
            if estimate_tokens(&candidate) > self.chunk_size {
                out.push(std::mem::replace(&mut buf, word.to_string()));
            } else {
                buf = candidate;
            }
        }

        if !buf.is_empty() {
            out.push(buf);
        }
        out
    }

    /// Longest character prefixes that fit in `chunk_size`, found by binary search.
    fn cut_word(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        let mut out = Vec::new();
        let mut offset = 0;

        while offset < chars.len() {
            let mut low = 1;
            let mut high = chars.len() - offset;
            let mut best = 1;

            while low <= high {
                let mid = (low + high) / 2;
                let piece: String = chars[offset..offset + mid].iter().collect();
                if estimate_tokens(&piece) <= self.chunk_size {
                    best = mid;
                    low = mid + 1;
                } else {
                    high = mid - 1;
                }
            }

            out.push(chars[offset..offset + best].iter().collect());
            offset += best;
        }
        out
    }
}

fn join(pieces: &[(String, usize)]) -> String {
    pieces
        .iter()
        .map(|(text, _)| text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Breaks text into sentences: lines first, then Unicode sentence boundaries.
fn sentences(text: &str) -> Vec<&str> {
    text.lines()
        .flat_map(|line| line.split_sentence_bounds())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences_split_on_terminators_and_lines() {
        let text = "Jane Doe. Rust engineer!\nLed a team of 5? Yes\n\nSkills: Go";
        assert_eq!(
            sentences(text),
            vec![
                "Jane Doe.",
                "Rust engineer!",
                "Led a team of 5?",
                "Yes",
                "Skills: Go"
            ]
        );
    }

    #[test]
    fn test_decimal_points_do_not_end_sentences() {
        assert_eq!(sentences("GPA 3.9 overall."), vec!["GPA 3.9 overall."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(SentenceSplitter::default().split("").is_empty());
        assert!(SentenceSplitter::default().split(" \n \n").is_empty());
    }

    #[test]
    fn test_short_text_is_a_single_chunk() {
        let chunks = SentenceSplitter::default().split("Jane Doe. Rust engineer.");
        assert_eq!(chunks, vec!["Jane Doe. Rust engineer."]);
    }

    #[test]
    fn test_cjk_sentences_split_on_full_stop() {
        assert_eq!(
            sentences("软件工程师。擅长分布式系统。"),
            vec!["软件工程师。", "擅长分布式系统。"]
        );
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = (0..20)
            .map(|i| format!("Sentence{i:02}."))
            .collect::<Vec<_>>()
            .join(" ");
        let splitter = SentenceSplitter::new(16, 6);

        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            let tokens: usize = chunk.split(' ').map(estimate_tokens).sum();
            assert!(tokens <= 16, "chunk too large: {chunk}");
        }
        // consecutive chunks share the carried-over sentence
        let first_tail = chunks[0].split(' ').last().unwrap();
        assert!(chunks[1].starts_with(first_tail));
    }

    #[test]
    fn test_every_sentence_survives_splitting() {
        let text = (0..50)
            .map(|i| format!("Fact number {i} about the candidate."))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = SentenceSplitter::new(40, 8).split(&text);
        for i in 0..50 {
            let needle = format!("Fact number {i} about");
            assert!(chunks.iter().any(|c| c.contains(&needle)), "lost {needle}");
        }
    }

    #[test]
    fn test_oversized_sentence_is_cut_at_words() {
        let long = vec!["word"; 100].join(" ");
        let splitter = SentenceSplitter::new(10, 0);
        let chunks = splitter.split(&long);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| estimate_tokens(c) <= 10));
    }

    #[test]
    fn test_oversized_word_is_cut_by_characters() {
        let blob = "x".repeat(100);
        let chunks = SentenceSplitter::new(5, 0).split(&blob);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| estimate_tokens(c) <= 5));
        assert_eq!(chunks.concat(), blob);
    }

    #[test]
    fn test_unspaced_cjk_text_is_chunked_by_tokens() {
        let text = "软件工程师擅长分布式系统".repeat(100);
        let chunks = SentenceSplitter::new(64, 0).split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| estimate_tokens(c) <= 64));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_overlap_is_clamped_below_chunk_size() {
        let splitter = SentenceSplitter::new(4, 10);
        assert_eq!(splitter.chunk_overlap, 3);
    }
}
