use std::collections::HashSet;

use crate::schema::{CanonicalReview, Issue, MAX_ISSUES, MAX_LIST_ITEMS, Severity};

/// Merge N per-chunk (or per-commit) canonical reviews into one.
///
/// Scores are weight-averaged and rounded to nearest; weights default to 1
/// per review and are typically per-chunk file counts. List fields are
/// unioned and deduplicated — string lists by exact value, issues by
/// `(severity, description)` — then capped, keeping higher severities when
/// the issue list overflows. Inputs are consumed; the output is fresh.
///
/// Zero reviews yields the fallback review; one review is returned
/// unchanged.
pub fn combine(reviews: Vec<CanonicalReview>, weights: &[u32]) -> CanonicalReview {
    if reviews.is_empty() {
        return CanonicalReview::fallback();
    }
    if reviews.len() == 1 {
        let mut only = reviews;
        return only.pop().expect("len checked above");
    }

    let weight_of = |i: usize| weights.get(i).copied().unwrap_or(1).max(1) as f64;
    let total_weight: f64 = (0..reviews.len()).map(weight_of).sum();

    let weighted = |f: fn(&CanonicalReview) -> u8| -> u8 {
        let sum: f64 = reviews
            .iter()
            .enumerate()
            .map(|(i, r)| f(r) as f64 * weight_of(i))
            .sum();
        (sum / total_weight).round().clamp(1.0, 10.0) as u8
    };

    let score = weighted(|r| r.score);
    let confidence = weighted(|r| r.confidence);

    let part_count = reviews.len();
    let file_count: u64 = (0..reviews.len()).map(|i| weight_of(i) as u64).sum();
    let mut summary = format!("Aggregated from {part_count} parts covering {file_count} files. ");
    summary.push_str(
        &reviews
            .iter()
            .map(|r| r.summary.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    );

    let issues = merge_issues(reviews.iter().flat_map(|r| r.issues.iter().cloned()));

    let review = CanonicalReview {
        score,
        confidence,
        summary,
        issues,
        suggestions: merge_strings(&reviews, |r| &r.suggestions),
        security: merge_strings(&reviews, |r| &r.security),
        performance: merge_strings(&reviews, |r| &r.performance),
        dependencies: merge_strings(&reviews, |r| &r.dependencies),
        accessibility: merge_strings(&reviews, |r| &r.accessibility),
        sources: merge_strings(&reviews, |r| &r.sources),
    };
    review.sanitized()
}

/// Union issues, dedup by `(severity, description)`, then cap — stable-sorted
/// by severity first so truncation drops the least severe.
fn merge_issues(issues: impl Iterator<Item = Issue>) -> Vec<Issue> {
    let mut seen: HashSet<(Severity, String)> = HashSet::new();
    let mut merged: Vec<Issue> = issues
        .filter(|issue| seen.insert(issue.dedup_key()))
        .collect();
    merged.sort_by_key(|i| i.severity.rank());
    merged.truncate(MAX_ISSUES);
    merged
}

/// Union string lists with exact-value set-dedup, preserving first-seen
/// order, capped to the schema limit.
fn merge_strings<'a>(
    reviews: &'a [CanonicalReview],
    field: fn(&'a CanonicalReview) -> &'a Vec<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for review in reviews {
        for item in field(review) {
            if !item.is_empty() && seen.insert(item.clone()) {
                merged.push(item.clone());
                if merged.len() >= MAX_LIST_ITEMS {
                    return merged;
                }
            }
        }
    }
    merged
}
