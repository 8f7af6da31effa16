use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

pub const STOPWORDS: [&str; 11] = [
    "pour", "avec", "dans", "des", "les", "qui", "une", "crew", "agent", "creer", "créer",
];
pub const FALLBACK_KEYWORDS: [&str; 2] = ["custom", "crew"];
pub const MAX_KEYWORDS: usize = 3;
/// Longest keyword kept in a project name, in characters. Keeps the directory
/// name well under common filesystem limits.
pub const MAX_KEYWORD_CHARS: usize = 32;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// Whole words of three or more letters; Unicode-aware so accented words stay intact.
static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\p{Alphabetic}{3,}\b").expect("word regex"));

pub fn extract_keywords(description: &str) -> Vec<String> {
    let lowered = description.to_lowercase();
    let keywords = WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| !STOPWORDS.contains(word))
        .take(MAX_KEYWORDS)
        .map(|word| word.chars().take(MAX_KEYWORD_CHARS).collect::<String>())
        .collect::<Vec<String>>();

    if keywords.is_empty() {
        return FALLBACK_KEYWORDS.iter().map(|w| w.to_string()).collect();
    }
    keywords
}

/// `crew_<kw1>_<kw2>_<kw3>_<YYYYMMDD_HHMMSS>`. Two runs in the same second with
/// the same keywords produce the same name.
pub fn generate_project_name(description: &str, timestamp: NaiveDateTime) -> String {
    let keywords = extract_keywords(description);
    format!(
        "crew_{}_{}",
        keywords.join("_"),
        timestamp.format(TIMESTAMP_FORMAT)
    )
}
