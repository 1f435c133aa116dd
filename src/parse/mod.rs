pub mod heuristic;
pub mod normalize;
pub mod repair;

use serde_json::Value;

use crate::schema::CanonicalReview;

/// Turn one raw model response into a canonical review. Total — any text
/// input (empty, random bytes, prose-wrapped JSON, truncated JSON) produces
/// a schema-valid review without raising.
///
/// Path: normalize → strict parse → truncation repair → strict parse →
/// heuristic extraction. Whichever path succeeds, the result goes through
/// field-level coercion in `CanonicalReview::from_value`.
pub fn parse_review(raw: &str) -> CanonicalReview {
    let candidate = normalize::normalize(raw);

    if let Some(review) = try_strict(&candidate) {
        return review;
    }

    let repaired = repair::repair(&candidate);
    if let Some(review) = try_strict(&repaired) {
        tracing::debug!("parsed model output after truncation repair");
        return review;
    }

    tracing::warn!("model output unparseable after repair, using heuristic extraction");
    heuristic::extract(raw)
}

/// Strict parse into a JSON object; anything else (arrays, scalars, parse
/// failures) falls through to the next stage.
fn try_strict(candidate: &str) -> Option<CanonicalReview> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    value.is_object().then(|| CanonicalReview::from_value(&value))
}
