use crate::schema::CanonicalReview;

/// Strings at or under this length are never flagged — short labels and
/// identifiers legitimately end without punctuation.
const MIN_CHECK_CHARS: usize = 20;

/// Heuristic: a string field that runs past `MIN_CHECK_CHARS` without
/// terminal punctuation was probably cut off by the model's output ceiling.
///
/// Known false-positive source: legitimately punctuation-free text (a bare
/// code identifier, a path). Accepted as-is; the caller only uses this to
/// trigger one bounded re-attempt, never to reject a review.
pub fn looks_truncated(review: &CanonicalReview) -> bool {
    if field_truncated(&review.summary) {
        return true;
    }
    review
        .issues
        .iter()
        .any(|i| field_truncated(&i.description) || field_truncated(&i.suggestion))
        || review.suggestions.iter().any(|s| field_truncated(s))
}

fn field_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.chars().count() <= MIN_CHECK_CHARS {
        return false;
    }
    !trimmed.ends_with(['.', '!', '?'])
}
