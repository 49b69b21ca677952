//! Pure candidate-tag extraction over comment bodies and discussion titles.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Fixed vocabulary of tags the extractor recognises. Matching is
/// case-insensitive and word-bounded.
const KNOWN_TAGS: &[&str] = &[
    "pytorch",
    "tensorflow",
    "jax",
    "onnx",
    "safetensors",
    "gguf",
    "transformers",
    "diffusers",
    "sentence-transformers",
    "peft",
    "text-generation",
    "text-classification",
    "image-classification",
    "object-detection",
    "translation",
    "summarization",
    "question-answering",
    "speech-recognition",
    "audio",
    "vision",
    "multimodal",
    "reinforcement-learning",
    "time-series",
    "tabular",
    "robotics",
    "biology",
    "chemistry",
    "medical",
    "legal",
    "finance",
    "code",
    "math",
];

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| {
        // Longest-first so hyphenated tags win over their own suffixes
        // ("sentence-transformers" before "transformers").
        let mut vocabulary = KNOWN_TAGS.to_vec();
        vocabulary.sort_by_key(|tag| std::cmp::Reverse(tag.len()));
        let alternation = vocabulary
            .iter()
            .map(|tag| regex::escape(tag))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("tag vocabulary pattern")
    })
}

/// Extracts the deduplicated candidate-tag set from a comment body and a
/// discussion title. Pure and deterministic: the result is normalised to
/// lowercase and sorted, and the same inputs always yield the same set. Empty
/// or no-match text yields an empty vector.
pub fn extract_candidate_tags(comment_body: &str, discussion_title: &str) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for text in [comment_body, discussion_title] {
        for found in tag_pattern().find_iter(text) {
            tags.insert(found.as_str().to_ascii_lowercase());
        }
    }
    tags.into_iter().collect()
}
