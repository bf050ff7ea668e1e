use std::sync::OnceLock;

use regex::Regex;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<@.*?>").expect("mention pattern is valid"))
}

/// Removes Slack mention markup (`<@...>`, non-greedy) from `text` and trims
/// surrounding whitespace.
///
/// Applied to both inbound user text and assistant replies before they are
/// persisted, so stored content never carries mention noise.
pub fn strip_mentions(text: &str) -> String {
    mention_pattern().replace_all(text, "").trim().to_string()
}
