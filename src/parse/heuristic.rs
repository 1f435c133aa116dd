use std::sync::LazyLock;

use regex::Regex;

use crate::schema::{
    CanonicalReview, Category, DEFAULT_CONFIDENCE, DEFAULT_SCORE, Issue, Severity, sanitize_text,
};

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bscore\b\D{0,10}(\d{1,2})").expect("score regex is valid"));

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bconfidence\b\D{0,10}(\d{1,2})").expect("confidence regex is valid")
});

static ISSUE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|problem|issue|vulnerability|security|bug)\b")
        .expect("issue keyword regex is valid")
});

/// Maximum synthetic issues extracted from raw text.
const MAX_HEURISTIC_ISSUES: usize = 5;

/// Minimum length for a sentence to qualify as the summary.
const MIN_SUMMARY_CHARS: usize = 10;

/// Last-resort extraction directly from raw text, no JSON parse at all.
/// Regex out a score and confidence, take the first real sentence as the
/// summary, and synthesize generic issues from keyword hits. Always returns
/// a valid review.
pub fn extract(raw: &str) -> CanonicalReview {
    let score = capture_number(&SCORE_RE, raw).unwrap_or(DEFAULT_SCORE);
    let confidence = capture_number(&CONFIDENCE_RE, raw).unwrap_or(DEFAULT_CONFIDENCE);

    let summary = first_sentence(raw)
        .unwrap_or_else(|| "Review content could not be extracted from the model response.".to_string());

    let issues = raw
        .lines()
        .filter(|line| ISSUE_KEYWORD_RE.is_match(line))
        .take(MAX_HEURISTIC_ISSUES)
        .map(|line| Issue {
            severity: Severity::Medium,
            description: sanitize_text(line.trim()),
            suggestion: String::new(),
            category: Category::Quality,
            citation: String::new(),
            auto_fixable: false,
        })
        .collect();

    CanonicalReview {
        score,
        confidence,
        summary,
        issues,
        ..CanonicalReview::default()
    }
    .sanitized()
}

fn capture_number(re: &Regex, raw: &str) -> Option<u8> {
    let captured = re.captures(raw)?.get(1)?.as_str().parse::<i64>().ok()?;
    Some(captured.clamp(1, 10) as u8)
}

/// First sentence of at least `MIN_SUMMARY_CHARS` characters, falling back
/// to the first sufficiently long line.
fn first_sentence(raw: &str) -> Option<String> {
    for piece in raw.split_inclusive(['.', '!', '?']) {
        let trimmed = piece.trim();
        if trimmed.chars().count() >= MIN_SUMMARY_CHARS {
            return Some(sanitize_text(trimmed));
        }
    }
    raw.lines()
        .map(str::trim)
        .find(|l| l.chars().count() >= MIN_SUMMARY_CHARS)
        .map(sanitize_text)
}
